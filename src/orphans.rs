use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;

pub const PLAYLIST_EXTENSION: &str = "m3u";

/// The outcome of reconciling the playlists just generated against the files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    /// Number of playlist files found under the playlist directory.
    pub discovered: usize,
    /// Symmetric difference of the expected and discovered keys.
    pub orphans: BTreeSet<String>,
    /// On disk but not generated: left over from memberships that no longer exist.
    pub stale: BTreeSet<String>,
    /// Generated but not on disk: the write did not happen.
    pub missing: BTreeSet<String>,
}

impl OrphanReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
    }
}

/// Relative, `/`-separated keys of every playlist file under `root`. A missing root holds no
/// playlists.
pub fn discover_playlist_files(root: &Path) -> Result<BTreeSet<String>> {
    let mut keys = BTreeSet::new();
    if !root.exists() {
        return Ok(keys);
    }

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PLAYLIST_EXTENSION) {
            continue;
        }
        if let Ok(relpath) = path.strip_prefix(root) {
            let key = relpath
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            keys.insert(key);
        }
    }

    Ok(keys)
}

pub fn reconcile(expected: &BTreeSet<String>, discovered: &BTreeSet<String>) -> OrphanReport {
    OrphanReport {
        discovered: discovered.len(),
        orphans: expected.symmetric_difference(discovered).cloned().collect(),
        stale: discovered.difference(expected).cloned().collect(),
        missing: expected.difference(discovered).cloned().collect(),
    }
}

/// Compare the keys just generated with the playlist files under `root`. Nothing is deleted.
pub fn detect_orphans(root: &Path, expected: &BTreeSet<String>) -> Result<OrphanReport> {
    let discovered = discover_playlist_files(root)?;
    info!("Scanning {} playlist files…", discovered.len());

    let report = reconcile(expected, &discovered);
    if report.is_clean() {
        info!("All playlists are fine.");
        return Ok(report);
    }

    info!("{} orphan playlists found", report.orphans.len());
    for key in &report.stale {
        info!("  {}", key);
    }
    for key in &report.missing {
        warn!("  {} was generated but is missing on disk", key);
    }
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Delete the file outright.
    Unlink,
    /// Move the file to the platform trash.
    Trash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub failures: Vec<(String, String)>,
}

/// Delete the given orphan playlists. Each file is removed independently; failures are collected.
pub fn remove_orphans(root: &Path, orphans: &BTreeSet<String>, removal: Removal) -> RemovalReport {
    let mut report = RemovalReport::default();
    for key in orphans {
        let path = root.join(key);
        let result = match removal {
            Removal::Unlink => fs::remove_file(&path).map_err(|e| e.to_string()),
            Removal::Trash => trash::delete(&path).map_err(|e| e.to_string()),
        };
        match result {
            Ok(()) => {
                debug!("Removed orphan playlist {}", path.display());
                report.removed.push(key.clone());
            }
            Err(e) => {
                warn!("Failed to remove orphan playlist {}: {}", path.display(), e);
                report.failures.push((key.clone(), e));
            }
        }
    }
    info!("Removed {} orphan playlists", report.removed.len());
    report
}
