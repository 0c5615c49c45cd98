use std::fs;
use std::path::PathBuf;
use std::sync::Once;

use tempfile::TempDir;

use crate::config::Config;
use crate::library::{Library, NewAlbum, NewItem};

static INIT: Once = Once::new();

pub fn init() -> TempDir {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")))
            .with_test_writer()
            .try_init();
    });
    TempDir::new().expect("failed to create temp dir")
}

// Creates a test config rooted in a temp dir, with no library contents and no playlists.
pub fn config() -> (Config, TempDir) {
    let temp_dir = init();
    let base_path = temp_dir.path();
    fs::create_dir_all(base_path.join("source")).expect("failed to create source dir");

    let config = Config {
        library: base_path.join("library.db"),
        directory: Some(base_path.join("music")),
        playlist_dir: base_path.join("playlists"),
        ..Config::default()
    };
    (config, temp_dir)
}

pub fn empty_library() -> (Library, Config, TempDir) {
    let (config, temp_dir) = config();
    let library = Library::open(&config.library).expect("failed to open library");
    (library, config, temp_dir)
}

pub fn source_path(temp_dir: &TempDir, release: &str, file: &str) -> PathBuf {
    temp_dir.path().join("source").join(release).join(file)
}

fn album(temp_dir: &TempDir, release: &str, albumartist: &str, year: i64, genre: &str, playlists: Option<&str>, tracks: &[&str]) -> NewAlbum {
    NewAlbum {
        albumartist: albumartist.to_string(),
        album: format!("Release {}", &release[1..]),
        year: Some(year),
        genre: genre.to_string(),
        playlists: playlists.map(str::to_string),
        items: tracks
            .iter()
            .enumerate()
            .map(|(i, file)| NewItem {
                disc: 1,
                track: i as i64 + 1,
                title: format!("Track {}", i + 1),
                path: source_path(temp_dir, release, file),
            })
            .collect(),
    }
}

// Creates a library with four albums. The track files exist but are empty.
//
//   r1  Techno Man       2023  Techno     2024-03            01.flac 02.flac
//   r2  Violin Woman     2021  Classical  2024-03,2024-04    01.flac
//   r3  Bass Man         2020  Rock       (none)             01.flac
//   r4  Conductor Woman  2019  Rock       2023-12            01.flac
pub fn seeded_library() -> (Library, Config, TempDir) {
    let (config, temp_dir) = config();
    let mut library = Library::open(&config.library).expect("failed to open library");

    let albums = [
        album(&temp_dir, "r1", "Techno Man", 2023, "Techno", Some("2024-03"), &["01.flac", "02.flac"]),
        album(&temp_dir, "r2", "Violin Woman", 2021, "Classical", Some("2024-03,2024-04"), &["01.flac"]),
        album(&temp_dir, "r3", "Bass Man", 2020, "Rock", None, &["01.flac"]),
        album(&temp_dir, "r4", "Conductor Woman", 2019, "Rock", Some("2023-12"), &["01.flac"]),
    ];
    for a in &albums {
        for item in &a.items {
            fs::create_dir_all(item.path.parent().unwrap()).expect("failed to create release dir");
            fs::write(&item.path, "").expect("failed to create track file");
        }
        library.add_album(a).expect("failed to add album");
    }

    (library, config, temp_dir)
}
