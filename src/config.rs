/// The config module provides the config spec and parsing logic.
///
/// The configuration is a TOML file. Unknown keys are reported with a warning rather than
/// rejected, and every value is validated up front so that a bad template or separator aborts
/// the session before any album is touched.
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::change::{format_tag_template, ChangePolicy};
use crate::common::{default_replacements, Replacement};
use crate::error::{ListenExpectedError, Result};

const KNOWN_KEYS: &[&str] = &[
    "library",
    "directory",
    "playlist_dir",
    "pl_tag_template",
    "pl_tag_separator",
    "relative",
    "auto",
    "write",
    "move",
    "confirm",
    "replacements",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The SQLite album library.
    pub library: PathBuf,
    /// Where music files are moved to when a command asks for it.
    pub directory: Option<PathBuf>,
    /// Root of the generated playlist files.
    pub playlist_dir: PathBuf,
    /// Template of the default playlist tag, formatted with the year and the month.
    pub pl_tag_template: String,
    pub pl_tag_separator: String,
    /// Write track paths relative to each playlist file's directory.
    pub relative: bool,
    /// Track album changes and regenerate the affected playlists when the session ends.
    pub auto: bool,
    pub write: bool,
    #[serde(rename = "move")]
    pub move_files: bool,
    pub confirm: bool,
    pub replacements: Vec<Replacement>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            library: default_data_dir().join("library.db"),
            directory: None,
            playlist_dir: PathBuf::from("."),
            pl_tag_template: "{0}-{1:>02}".to_string(),
            pl_tag_separator: ",".to_string(),
            relative: false,
            auto: true,
            write: true,
            move_files: false,
            confirm: true,
            replacements: default_replacements(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "listen")
}

fn default_data_dir() -> PathBuf {
    project_dirs().map(|d| d.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

impl Config {
    /// Load the configuration from `path`, or from the default location when `path` is `None`.
    /// A missing file at the default location yields the default configuration.
    pub fn parse(path: Option<&Path>) -> Result<Config> {
        let (cfgpath, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Config::default()),
            },
        };

        if !cfgpath.exists() {
            if explicit {
                return Err(ListenExpectedError::ConfigNotFound { path: cfgpath }.into());
            }
            debug!("No configuration file at {}, using defaults", cfgpath.display());
            return Ok(Config::default());
        }

        let text = fs::read_to_string(&cfgpath)?;
        Self::parse_str(&text, &cfgpath)
    }

    pub fn parse_str(text: &str, cfgpath: &Path) -> Result<Config> {
        let table: toml::Table = toml::from_str(text).map_err(|e| ListenExpectedError::ConfigDecode {
            path: cfgpath.to_path_buf(),
            message: e.to_string(),
        })?;
        for key in table.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("Unrecognized key {} in configuration file ({})", key, cfgpath.display());
            }
        }

        let mut config: Config = toml::Value::Table(table).try_into().map_err(|e: toml::de::Error| ListenExpectedError::ConfigDecode {
            path: cfgpath.to_path_buf(),
            message: e.to_string(),
        })?;
        config.library = expand_path(&config.library);
        config.playlist_dir = expand_path(&config.playlist_dir);
        config.directory = config.directory.as_deref().map(expand_path);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pl_tag_separator.is_empty() {
            return Err(ListenExpectedError::InvalidConfigValue {
                key: "pl_tag_separator".to_string(),
                message: "must not be empty".to_string(),
            }
            .into());
        }
        format_tag_template(&self.pl_tag_template, 2000, 1).map_err(|message| ListenExpectedError::InvalidConfigValue {
            key: "pl_tag_template".to_string(),
            message,
        })?;
        Ok(())
    }

    pub fn change_policy(&self) -> ChangePolicy {
        ChangePolicy {
            write: self.write,
            move_files: self.move_files,
            confirm: self.confirm,
        }
    }
}
