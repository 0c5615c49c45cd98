/// The common module is our grab bag of small helpers shared by the rest of the crate: the path
/// sanitizer, a couple of collection helpers and logging setup.
use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};
use unicode_normalization::UnicodeNormalization;

use crate::error::{ListenError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A single substitution applied to every component of a generated path.
#[derive(Debug, Clone, Deserialize)]
pub struct Replacement {
    #[serde(with = "serde_regex")]
    pub pattern: Regex,
    #[serde(rename = "with")]
    pub replacement: String,
}

impl Replacement {
    pub fn new(pattern: &str, replacement: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Replacement {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }
}

static DEFAULT_REPLACEMENTS: Lazy<Vec<Replacement>> = Lazy::new(|| {
    [
        (r"[\\/]", "_"),
        (r"^\.", "_"),
        (r"[\x00-\x1f]", ""),
        (r#"[<>:"\?\*\|]"#, "_"),
        (r"\.$", "_"),
        (r"\s+$", ""),
        (r"^\s+", ""),
        (r"^-", "_"),
    ]
    .into_iter()
    .map(|(p, r)| Replacement::new(p, r).expect("default replacement patterns are valid"))
    .collect()
});

pub fn default_replacements() -> Vec<Replacement> {
    DEFAULT_REPLACEMENTS.clone()
}

/// Make a `/`-separated relative path safe to create on disk. Each component is run through the
/// replacements in order; the separators themselves are never replaced.
pub fn sanitize_path(path: &str, replacements: &[Replacement]) -> String {
    path.split('/')
        .filter(|component| !component.is_empty())
        .map(|component| {
            let mut component = component.to_string();
            for r in replacements {
                component = r.pattern.replace_all(&component, r.replacement.as_str()).into_owned();
            }
            component.nfd().collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The raw bytes of a path, as written to playlist files and stored in the library.
#[cfg(unix)]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

pub fn uniq<T: Clone + Eq + Hash>(xs: Vec<T>) -> Vec<T> {
    let mut rv = Vec::new();
    let mut seen = HashSet::new();
    for x in xs {
        if seen.insert(x.clone()) {
            rv.push(x);
        }
    }
    rv
}

/// Where log lines end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    File,
}

/// Install the global tracing subscriber. The returned guard must be held for as long as file
/// logging should be flushed.
pub fn initialize_logging(output: LogOutput, verbose: bool) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match output {
        LogOutput::Stderr => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber).map_err(|e| ListenError::Generic(e.to_string()))?;
            Ok(None)
        }
        LogOutput::File => {
            let proj_dirs =
                ProjectDirs::from("", "", "listen").ok_or_else(|| ListenError::Generic("Failed to get project directories".to_string()))?;
            let log_dir = proj_dirs.state_dir().unwrap_or(proj_dirs.cache_dir());
            fs::create_dir_all(log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix("listen")
                .filename_suffix("log")
                .build(log_dir)
                .map_err(|e| ListenError::Generic(format!("Failed to open log file: {e}")))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber).map_err(|e| ListenError::Generic(e.to_string()))?;
            Ok(Some(guard))
        }
    }
}
