use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::common::uniq;
use crate::error::{ListenExpectedError, Result};
use crate::library::Album;

/// Prefix marking a command line token as a playlist tag rather than a query term.
pub const TAG_MARKER: char = '@';

/// Resolve a tri-state command line option against the configured policy.
pub fn resolve(local: Option<bool>, global: bool) -> bool {
    local.unwrap_or(global)
}

/// The per-invocation toggles of a membership command. `None` defers to the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeOptions {
    pub write: Option<bool>,
    pub move_files: Option<bool>,
    pub confirm: Option<bool>,
}

/// The configured defaults the options fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePolicy {
    pub write: bool,
    pub move_files: bool,
    pub confirm: bool,
}

impl Default for ChangePolicy {
    fn default() -> Self {
        ChangePolicy {
            write: true,
            move_files: false,
            confirm: true,
        }
    }
}

/// Format a playlist tag template such as `{0}-{1:>02}` with a year and a month.
///
/// Supported placeholders are `{0}` (year) and `{1}` (month), each optionally followed by a
/// `:[[fill]align]width` spec where align is one of `<`, `>`, `^`. A bare `0width` spec zero-pads.
pub fn format_tag_template(template: &str, year: i32, month: u32) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(format!("unterminated placeholder in {template:?}")),
                    }
                }
                let (index, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let value = match index {
                    "0" => year.to_string(),
                    "1" => month.to_string(),
                    _ => return Err(format!("unknown placeholder {{{field}}}: only {{0}} and {{1}} are available")),
                };
                out.push_str(&apply_format_spec(&value, spec)?);
            }
            '}' => return Err(format!("single '}}' in {template:?}")),
            c => out.push(c),
        }
    }

    Ok(out)
}

fn apply_format_spec(value: &str, spec: &str) -> std::result::Result<String, String> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let chars: Vec<char> = spec.chars().collect();
    let is_align = |c: char| matches!(c, '<' | '>' | '^');

    let (fill, align, rest) = if chars.len() >= 2 && is_align(chars[1]) {
        (Some(chars[0]), chars[1], &chars[2..])
    } else if is_align(chars[0]) {
        (None, chars[0], &chars[1..])
    } else {
        (None, '<', &chars[..])
    };

    // A leading zero on the width means zero padding unless a fill was given, like `{1:>02}`.
    let (fill, align) = match (fill, rest.first()) {
        (Some(fill), _) => (fill, align),
        (None, Some('0')) if rest.len() > 1 || chars.len() == 1 => ('0', if is_align(chars[0]) { align } else { '>' }),
        (None, _) => (' ', align),
    };

    let width: String = rest.iter().collect();
    let width: usize = if width.is_empty() {
        0
    } else {
        width.parse().map_err(|_| format!("invalid format spec {spec:?}"))?
    };

    let len = value.chars().count();
    if len >= width {
        return Ok(value.to_string());
    }
    let pad = width - len;
    let repeat = |n: usize| fill.to_string().repeat(n);
    Ok(match align {
        '>' => format!("{}{value}", repeat(pad)),
        '^' => format!("{}{value}{}", repeat(pad / 2), repeat(pad - pad / 2)),
        _ => format!("{value}{}", repeat(pad)),
    })
}

/// A parsed membership command: which playlist tags to add or remove, and on which albums.
#[derive(Debug, Clone)]
pub struct ChangeRequest {
    explicit_tags: Vec<String>,
    residual_query: Vec<String>,
    options: ChangeOptions,
    policy: ChangePolicy,
    default_playlist: String,
}

impl ChangeRequest {
    /// Split `tokens` into explicit `@tag` tokens and query terms. Marked tokens that do not fully
    /// match `tag_pattern` are dropped. The default playlist is computed from `today` once, here.
    pub fn new(
        tokens: &[String],
        options: ChangeOptions,
        policy: ChangePolicy,
        tag_template: &str,
        tag_pattern: &str,
        today: NaiveDate,
    ) -> Result<ChangeRequest> {
        let pattern = Regex::new(&format!("^(?:{tag_pattern})$")).map_err(|e| ListenExpectedError::InvalidTagPattern {
            pattern: tag_pattern.to_string(),
            message: e.to_string(),
        })?;
        let default_playlist =
            format_tag_template(tag_template, today.year(), today.month()).map_err(|message| ListenExpectedError::InvalidConfigValue {
                key: "pl_tag_template".to_string(),
                message,
            })?;

        let mut explicit_tags = Vec::new();
        let mut residual_query = Vec::new();
        for token in tokens {
            match token.strip_prefix(TAG_MARKER) {
                Some(tag) if pattern.is_match(tag) => explicit_tags.push(tag.to_string()),
                Some(tag) => tracing::debug!("Ignoring malformed playlist tag {}", tag),
                None => residual_query.push(token.clone()),
            }
        }

        Ok(ChangeRequest {
            explicit_tags: uniq(explicit_tags),
            residual_query,
            options,
            policy,
            default_playlist,
        })
    }

    /// Same as [`ChangeRequest::new`], with the default playlist taken from the local date.
    pub fn today(tokens: &[String], options: ChangeOptions, policy: ChangePolicy, tag_template: &str, tag_pattern: &str) -> Result<ChangeRequest> {
        Self::new(tokens, options, policy, tag_template, tag_pattern, Local::now().date_naive())
    }

    pub fn explicit_tags(&self) -> &[String] {
        &self.explicit_tags
    }

    /// The album selection query terms.
    pub fn query(&self) -> &[String] {
        &self.residual_query
    }

    pub fn write(&self) -> bool {
        resolve(self.options.write, self.policy.write)
    }

    pub fn move_files(&self) -> bool {
        resolve(self.options.move_files, self.policy.move_files)
    }

    pub fn confirm(&self) -> bool {
        resolve(self.options.confirm, self.policy.confirm)
    }

    pub fn default_playlist(&self) -> &str {
        &self.default_playlist
    }

    /// The tags the command applies. Never empty.
    pub fn playlists(&self) -> Vec<String> {
        if self.explicit_tags.is_empty() {
            vec![self.default_playlist.clone()]
        } else {
            self.explicit_tags.clone()
        }
    }
}

/// Split an album's tag string into its set of tags. Empty fragments are not tags.
pub fn split_tags(tags: &str, separator: &str) -> BTreeSet<String> {
    tags.split(separator).map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// The membership attributes an album should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumMods {
    pub listen: bool,
    pub playlists: String,
    pub plays_nb: i64,
}

impl AlbumMods {
    fn from_tags(tags: BTreeSet<String>, separator: &str, listen: bool) -> Self {
        AlbumMods {
            listen,
            plays_nb: tags.len() as i64,
            playlists: tags.into_iter().collect::<Vec<_>>().join(separator),
        }
    }

    /// Add `playlists` to the album's memberships.
    pub fn add(album: &Album, playlists: &[String], separator: &str) -> Self {
        let mut tags = split_tags(album.playlists_str(), separator);
        tags.extend(playlists.iter().cloned());
        Self::from_tags(tags, separator, true)
    }

    /// Remove `playlists` from the album's memberships. An album left without memberships is no
    /// longer flagged as listened.
    pub fn remove(album: &Album, playlists: &[String], separator: &str) -> Self {
        let mut tags = split_tags(album.playlists_str(), separator);
        for playlist in playlists {
            tags.remove(playlist);
        }
        let listen = !tags.is_empty();
        Self::from_tags(tags, separator, listen)
    }

    /// Apply the modifications and report the fields that actually changed. Unset attributes
    /// count as empty, false and zero.
    pub fn apply(&self, album: &mut Album) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        let old = album.playlists_str().to_string();
        if old != self.playlists {
            changes.push(FieldChange::new("playlists", old, self.playlists.clone()));
            album.playlists = Some(self.playlists.clone());
        }
        let old = album.listen.unwrap_or(false);
        if old != self.listen {
            changes.push(FieldChange::new("listen", old.to_string(), self.listen.to_string()));
            album.listen = Some(self.listen);
        }
        let old = album.plays_nb.unwrap_or(0);
        if old != self.plays_nb {
            changes.push(FieldChange::new("plays_nb", old.to_string(), self.plays_nb.to_string()));
            album.plays_nb = Some(self.plays_nb);
        }

        changes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    fn new(field: &'static str, old: String, new: String) -> Self {
        FieldChange { field, old, new }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old, self.new)
    }
}
