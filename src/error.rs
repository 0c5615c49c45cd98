use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListenError {
    #[error("Listen error: {0}")]
    Generic(String),
    #[error(transparent)]
    Expected(#[from] ListenExpectedError),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk playlist directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors caused by user input or configuration. These are reported to the operator without a
/// backtrace-worthy failure.
#[derive(Error, Debug)]
pub enum ListenExpectedError {
    #[error("{0}")]
    Generic(String),
    #[error("Configuration file not found ({path})")]
    ConfigNotFound { path: PathBuf },
    #[error("Failed to decode configuration file ({path}): {message}")]
    ConfigDecode { path: PathBuf, message: String },
    #[error("Invalid value for {key} in configuration: {message}")]
    InvalidConfigValue { key: String, message: String },
    #[error("Invalid playlist tag pattern {pattern}: {message}")]
    InvalidTagPattern { pattern: String, message: String },
    #[error("{0}")]
    InvalidQuery(String),
    #[error("No playlist family registered under the name {name}")]
    UnknownFamily { name: String },
    #[error("Album does not exist: {id}")]
    AlbumDoesNotExist { id: i64 },
    #[error("Cannot move {} to {}: the destination is already taken", src.display(), dest.display())]
    MoveConflict { src: PathBuf, dest: PathBuf },
    #[error("Playlists were generated but are missing on disk: {}", keys.join(", "))]
    MissingPlaylistFiles { keys: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ListenError>;
