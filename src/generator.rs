use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::common::{path_from_bytes, path_to_bytes, Replacement};
use crate::config::Config;
use crate::descriptors::PlaylistDescriptor;
use crate::error::{ListenExpectedError, Result};
use crate::families::FamilyRegistry;
use crate::library::AlbumStore;
use crate::orphans::{detect_orphans, OrphanReport};

/// The unit of work a generation failure is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedUnit {
    Family(String),
    Album { family: String, album_id: i64 },
    File(String),
    Reconcile,
}

impl fmt::Display for FailedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedUnit::Family(name) => write!(f, "family {name}"),
            FailedUnit::Album { family, album_id } => write!(f, "album {album_id} of family {family}"),
            FailedUnit::File(key) => write!(f, "playlist {key}"),
            FailedUnit::Reconcile => write!(f, "orphan detection"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub unit: FailedUnit,
    pub message: String,
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Names of the families that were generated.
    pub families: Vec<String>,
    /// Playlists written, with their number of entries.
    pub written: BTreeMap<String, usize>,
    pub failures: Vec<GenerationFailure>,
    pub orphans: Option<OrphanReport>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.orphans.as_ref().map_or(true, |o| o.missing.is_empty())
    }

    /// Escalate playlists that were generated but are not on disk.
    pub fn ensure_complete(&self) -> Result<()> {
        match &self.orphans {
            Some(orphans) if !orphans.missing.is_empty() => Err(ListenExpectedError::MissingPlaylistFiles {
                keys: orphans.missing.iter().cloned().collect(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn fail(&mut self, unit: FailedUnit, message: impl ToString) {
        let failure = GenerationFailure {
            unit,
            message: message.to_string(),
        };
        warn!("Failed to generate {}", failure);
        self.failures.push(failure);
    }
}

/// Turns playlist families into playlist files.
pub struct Generator<'a> {
    store: &'a dyn AlbumStore,
    registry: &'a FamilyRegistry,
    playlist_dir: PathBuf,
    relative: bool,
    replacements: &'a [Replacement],
}

impl<'a> Generator<'a> {
    pub fn new(store: &'a dyn AlbumStore, registry: &'a FamilyRegistry, playlist_dir: &Path, relative: bool, replacements: &'a [Replacement]) -> Self {
        Generator {
            store,
            registry,
            playlist_dir: std::path::absolute(playlist_dir).unwrap_or_else(|_| playlist_dir.to_path_buf()),
            relative,
            replacements,
        }
    }

    pub fn from_config(store: &'a dyn AlbumStore, registry: &'a FamilyRegistry, c: &'a Config) -> Self {
        Self::new(store, registry, &c.playlist_dir, c.relative, &c.replacements)
    }

    pub fn playlist_dir(&self) -> &Path {
        &self.playlist_dir
    }

    /// Regenerate the playlists of `descriptors`, then reconcile the playlist directory.
    ///
    /// Fails up front if a descriptor has no registered family rule. Past that point failures are
    /// recorded in the report and the remaining families and files are still processed.
    pub fn generate(&self, descriptors: &[PlaylistDescriptor]) -> Result<GenerationReport> {
        self.registry.ensure_registered(descriptors)?;
        info!("Updating {} smart playlists…", descriptors.len());

        let mut report = GenerationReport {
            families: descriptors.iter().map(|d| d.name.clone()).collect(),
            ..Default::default()
        };

        let playlists = self.collect(descriptors, &mut report);
        for (key, paths) in &playlists {
            match write_playlist(&self.playlist_dir.join(key), paths) {
                Ok(()) => {
                    debug!("Wrote {} entries to {}", paths.len(), key);
                    report.written.insert(key.clone(), paths.len());
                }
                Err(e) => report.fail(FailedUnit::File(key.clone()), e),
            }
        }
        info!("{} playlists updated", report.written.len());

        let expected: BTreeSet<String> = playlists.into_keys().collect();
        match detect_orphans(&self.playlist_dir, &expected) {
            Ok(orphans) => report.orphans = Some(orphans),
            Err(e) => report.fail(FailedUnit::Reconcile, e),
        }

        Ok(report)
    }

    /// Gather the ordered track paths of every playlist file of `descriptors`. Lists for the same
    /// key accumulate across albums and families.
    pub fn collect(&self, descriptors: &[PlaylistDescriptor], report: &mut GenerationReport) -> BTreeMap<String, Vec<PathBuf>> {
        let mut playlists: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        for descriptor in descriptors {
            debug!("Creating playlist {}", descriptor.name);
            let albums = descriptor
                .query_and_sort()
                .map_err(|e| e.to_string())
                .and_then(|(query, sort)| self.store.albums(&query, &sort).map_err(|e| e.to_string()));
            let albums = match albums {
                Ok(albums) => albums,
                Err(e) => {
                    report.fail(FailedUnit::Family(descriptor.name.clone()), e);
                    continue;
                }
            };

            for album in albums {
                let keys = match self.registry.file_keys(&descriptor.name, album.playlists_str(), self.replacements) {
                    Ok(keys) => keys,
                    Err(e) => {
                        report.fail(FailedUnit::Family(descriptor.name.clone()), e);
                        break;
                    }
                };
                if keys.is_empty() {
                    continue;
                }
                let items = match self.store.items(&album) {
                    Ok(items) => items,
                    Err(e) => {
                        report.fail(
                            FailedUnit::Album {
                                family: descriptor.name.clone(),
                                album_id: album.id,
                            },
                            e,
                        );
                        continue;
                    }
                };
                for key in keys {
                    let entries = playlists.entry(key.clone()).or_default();
                    entries.extend(items.iter().map(|item| self.item_path(&item.path, &key)));
                }
            }
        }

        playlists
    }

    /// The path written for a track in the playlist `key`: relative to the playlist's own
    /// directory in relative mode, verbatim otherwise.
    pub fn item_path(&self, item_path: &Path, key: &str) -> PathBuf {
        if !self.relative {
            return item_path.to_path_buf();
        }
        let playlist_path = self.playlist_dir.join(key);
        let base = playlist_path.parent().unwrap_or(&self.playlist_dir);
        let item_path = std::path::absolute(item_path).unwrap_or_else(|_| item_path.to_path_buf());
        relative_path(&item_path, base)
    }
}

/// Write one path per line, replacing whatever was at `path`.
pub fn write_playlist(path: &Path, paths: &[PathBuf]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for p in paths {
        writer.write_all(&path_to_bytes(p))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_playlist(path: &Path) -> Result<Vec<PathBuf>> {
    let bytes = fs::read(path)?;
    let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    // The last line is terminated too.
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    Ok(lines.into_iter().map(path_from_bytes).collect())
}

/// Lexically normalize a path: drop `.` components and fold `..` into their parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}

/// Express `path` relative to the directory `base`. Paths on a different root are returned as is.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);
    let path_components: Vec<Component> = path.components().collect();
    let base_components: Vec<Component> = base.components().collect();

    if path_components.first() != base_components.first() {
        return path;
    }

    let common = path_components.iter().zip(base_components.iter()).take_while(|(a, b)| a == b).count();
    let mut rel = PathBuf::new();
    for _ in common..base_components.len() {
        rel.push("..");
    }
    for c in &path_components[common..] {
        rel.push(c.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}
