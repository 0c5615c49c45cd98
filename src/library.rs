use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info, warn};

use crate::common::{path_from_bytes, path_to_bytes, sanitize_path, Replacement};
use crate::error::{ListenError, ListenExpectedError, Result};
use crate::query::{Field, Query, Sort};

static LIBRARY_SCHEMA: &str = include_str!("library.sql");

/// A value read off an album for matching and sorting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: i64,
    pub albumartist: String,
    pub album: String,
    pub year: Option<i64>,
    pub genre: String,
    /// Delimited set of playlist tags. `None` and `Some("")` both mean no memberships.
    pub playlists: Option<String>,
    pub listen: Option<bool>,
    pub plays_nb: Option<i64>,
}

impl Album {
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Id => Some(FieldValue::Int(self.id)),
            Field::AlbumArtist => Some(FieldValue::Text(self.albumartist.clone())),
            Field::Album => Some(FieldValue::Text(self.album.clone())),
            Field::Year => self.year.map(FieldValue::Int),
            Field::Genre => Some(FieldValue::Text(self.genre.clone())),
            Field::Playlists => self.playlists.clone().map(FieldValue::Text),
            Field::Listen => self.listen.map(FieldValue::Bool),
            Field::PlaysNb => self.plays_nb.map(FieldValue::Int),
        }
    }

    pub fn playlists_str(&self) -> &str {
        self.playlists.as_deref().unwrap_or("")
    }

    pub fn logtext(&self) -> String {
        match self.year {
            Some(year) => format!("{} - {} [{}]", self.albumartist, self.album, year),
            None => format!("{} - {}", self.albumartist, self.album),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub album_id: i64,
    pub disc: i64,
    pub track: i64,
    pub title: String,
    pub path: PathBuf,
}

/// A record delivered by a change notification.
#[derive(Debug, Clone)]
pub enum Record {
    Album(Album),
    Item(Item),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Persist the new metadata to the files' tags.
    pub write: bool,
    /// Move the files to their canonical location in the library directory.
    pub move_files: bool,
}

/// The album store the playlist engine runs against.
pub trait AlbumStore {
    /// Albums matching `query`, ordered by `sort` or by the store's default order when the sort is
    /// empty.
    fn albums(&self, query: &Query, sort: &Sort) -> Result<Vec<Album>>;

    /// The tracks of an album, in album order.
    fn items(&self, album: &Album) -> Result<Vec<Item>>;

    /// Persist the membership attributes of `albums` in a single transaction.
    fn store(&mut self, albums: &[Album], sync: SyncOptions) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub disc: i64,
    pub track: i64,
    pub title: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct NewAlbum {
    pub albumartist: String,
    pub album: String,
    pub year: Option<i64>,
    pub genre: String,
    pub playlists: Option<String>,
    pub items: Vec<NewItem>,
}

/// SQLite backed album store.
pub struct Library {
    conn: Connection,
    directory: Option<PathBuf>,
    replacements: Vec<Replacement>,
}

impl Library {
    pub fn open(path: &Path) -> Result<Library> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 15000;
            ",
        )?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Library> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Library> {
        conn.execute_batch(LIBRARY_SCHEMA)?;
        Ok(Library {
            conn,
            directory: None,
            replacements: Vec::new(),
        })
    }

    /// Set the music directory files are moved into when a store requests it.
    pub fn with_directory(mut self, directory: PathBuf, replacements: Vec<Replacement>) -> Library {
        self.directory = Some(directory);
        self.replacements = replacements;
        self
    }

    pub fn add_album(&mut self, new: &NewAlbum) -> Result<Album> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO albums (albumartist, album, year, genre, playlists) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.albumartist, new.album, new.year, new.genre, new.playlists],
        )?;
        let album_id = tx.last_insert_rowid();
        for item in &new.items {
            tx.execute(
                "INSERT INTO items (album_id, disc, track, title, path) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![album_id, item.disc, item.track, item.title, path_to_bytes(&item.path)],
            )?;
        }
        tx.commit()?;
        debug!("Added album {} with {} tracks", album_id, new.items.len());

        self.get_album(album_id)?
            .ok_or_else(|| ListenExpectedError::AlbumDoesNotExist { id: album_id }.into())
    }

    pub fn get_album(&self, id: i64) -> Result<Option<Album>> {
        let album = self
            .conn
            .query_row(
                "SELECT id, albumartist, album, year, genre, playlists, listen, plays_nb FROM albums WHERE id = ?1",
                params![id],
                album_from_row,
            )
            .optional()?;
        Ok(album)
    }

    /// Where `item` lives once moved into `directory`. Tracks of albums spanning several discs go
    /// into one subdirectory per disc.
    fn canonical_item_path(&self, directory: &Path, album: &Album, item: &Item, multi_disc: bool) -> Option<PathBuf> {
        let filename = item.path.file_name()?.to_string_lossy();
        let relpath = if multi_disc {
            format!("{}/{}/Disc {}/{}", album.albumartist, album.album, item.disc, filename)
        } else {
            format!("{}/{}/{}", album.albumartist, album.album, filename)
        };
        Some(directory.join(sanitize_path(&relpath, &self.replacements)))
    }

    /// Plan the file moves of a store. Fails before anything is touched when two tracks would land
    /// on the same path or when a destination is already occupied.
    fn plan_moves(&self, directory: &Path, albums: &[Album]) -> Result<Vec<FileMove>> {
        let mut moves = Vec::new();
        let mut taken = HashSet::new();
        for album in albums {
            let items = self.items(album)?;
            let multi_disc = items.iter().map(|i| i.disc).collect::<HashSet<_>>().len() > 1;
            for item in items {
                let Some(dest) = self.canonical_item_path(directory, album, &item, multi_disc) else {
                    continue;
                };
                if dest == item.path {
                    taken.insert(dest);
                    continue;
                }
                if !taken.insert(dest.clone()) || dest.exists() {
                    return Err(ListenExpectedError::MoveConflict { src: item.path, dest }.into());
                }
                moves.push(FileMove {
                    item_id: item.id,
                    src: item.path,
                    dest,
                });
            }
        }
        Ok(moves)
    }
}

struct FileMove {
    item_id: i64,
    src: PathBuf,
    dest: PathBuf,
}

/// Rename the files and record their new paths in `tx`. `done` counts the renames that happened,
/// so that a caller can put them back when a later step fails.
fn apply_moves(tx: &Transaction, moves: &[FileMove], done: &mut usize) -> Result<()> {
    for m in moves {
        if let Some(parent) = m.dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&m.src, &m.dest).map_err(|e| ListenError::Generic(format!("Failed to move {} to {}: {e}", m.src.display(), m.dest.display())))?;
        *done += 1;
        tx.execute("UPDATE items SET path = ?1 WHERE id = ?2", params![path_to_bytes(&m.dest), m.item_id])?;
        debug!("Moved {} to {}", m.src.display(), m.dest.display());
    }
    Ok(())
}

fn undo_moves(moves: &[FileMove]) {
    for m in moves.iter().rev() {
        match fs::rename(&m.dest, &m.src) {
            Ok(()) => debug!("Moved {} back to {}", m.dest.display(), m.src.display()),
            Err(e) => warn!("Failed to move {} back to {}: {}", m.dest.display(), m.src.display(), e),
        }
    }
}

fn album_from_row(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        albumartist: row.get(1)?,
        album: row.get(2)?,
        year: row.get(3)?,
        genre: row.get(4)?,
        playlists: row.get(5)?,
        listen: row.get(6)?,
        plays_nb: row.get(7)?,
    })
}

fn item_from_row(row: &Row) -> rusqlite::Result<Item> {
    let path: Vec<u8> = row.get(5)?;
    Ok(Item {
        id: row.get(0)?,
        album_id: row.get(1)?,
        disc: row.get(2)?,
        track: row.get(3)?,
        title: row.get(4)?,
        path: path_from_bytes(&path),
    })
}

impl AlbumStore for Library {
    fn albums(&self, query: &Query, sort: &Sort) -> Result<Vec<Album>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, albumartist, album, year, genre, playlists, listen, plays_nb FROM albums ORDER BY id")?;
        let mut albums = Vec::new();
        for album in stmt.query_map([], album_from_row)? {
            let album = album?;
            if query.matches(&album) {
                albums.push(album);
            }
        }
        sort.apply(&mut albums);
        Ok(albums)
    }

    fn items(&self, album: &Album) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, album_id, disc, track, title, path FROM items WHERE album_id = ?1 ORDER BY disc, track, id")?;
        let items = stmt.query_map(params![album.id], item_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn store(&mut self, albums: &[Album], sync: SyncOptions) -> Result<()> {
        let mut moves = Vec::new();
        if sync.move_files {
            match &self.directory {
                Some(directory) => moves = self.plan_moves(directory, albums)?,
                None => debug!("No library directory configured: not moving files"),
            }
        }
        if sync.write {
            // The SQLite store keeps no audio tags of its own; the membership attributes live in
            // the albums table only.
            debug!("Tag writing requested for {} albums: attributes stored in the library only", albums.len());
        }

        let tx = self.conn.transaction()?;
        for album in albums {
            let updated = tx.execute(
                "UPDATE albums SET playlists = ?1, listen = ?2, plays_nb = ?3 WHERE id = ?4",
                params![album.playlists, album.listen, album.plays_nb, album.id],
            )?;
            if updated == 0 {
                return Err(ListenExpectedError::AlbumDoesNotExist { id: album.id }.into());
            }
        }
        // The database must never point at a file that is not there: any failure from the first
        // rename to the commit puts the moved files back.
        let mut done = 0;
        let result = apply_moves(&tx, &moves, &mut done).and_then(|()| tx.commit().map_err(ListenError::from));
        if let Err(e) = result {
            undo_moves(&moves[..done]);
            return Err(e);
        }

        info!("Stored {} albums", albums.len());
        Ok(())
    }
}
