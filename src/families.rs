use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::{sanitize_path, Replacement};
use crate::descriptors::{PlaylistDescriptor, BY_MONTH, BY_YEAR, MONTH_PATTERN, YEAR_PATTERN};
use crate::error::{ListenExpectedError, Result};

static MONTH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("({MONTH_PATTERN})")).unwrap());
static YEAR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("({YEAR_PATTERN})")).unwrap());

/// Turns the playlist tag string of one album into the playlist files it belongs to.
pub trait FamilyRule {
    /// Relative file keys, unsanitized, in the order the rule defines. An empty tag string yields
    /// no keys.
    fn playlist_keys(&self, tags: &str) -> Vec<String>;
}

/// One playlist per month tag, e.g. `2024-03` → `2024/03 March.m3u`.
///
/// Every occurrence of a month tag yields a key, so a tag string that repeats a month lists the
/// album twice in that playlist.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByMonth;

impl FamilyRule for ByMonth {
    fn playlist_keys(&self, tags: &str) -> Vec<String> {
        MONTH_REGEX
            .find_iter(tags)
            .filter_map(|m| {
                let (year, month) = m.as_str().split_once('-')?;
                let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?;
                Some(date.format("%Y/%m %B.m3u").to_string())
            })
            .collect()
    }
}

/// One playlist per distinct year, e.g. `2024` → `2024/00 All.m3u`, sorted by year.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByYear;

impl FamilyRule for ByYear {
    fn playlist_keys(&self, tags: &str) -> Vec<String> {
        YEAR_REGEX
            .find_iter(tags)
            .map(|m| m.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|year| format!("{year}/00 All.m3u"))
            .collect()
    }
}

/// Maps a family name to its rule. A new family is added by registering a rule under the same
/// name as its descriptor.
#[derive(Default)]
pub struct FamilyRegistry {
    rules: HashMap<String, Box<dyn FamilyRule>>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BY_MONTH, ByMonth);
        registry.register(BY_YEAR, ByYear);
        registry
    }

    pub fn register(&mut self, name: &str, rule: impl FamilyRule + 'static) {
        self.rules.insert(name.to_string(), Box::new(rule));
    }

    pub fn get(&self, name: &str) -> Option<&dyn FamilyRule> {
        self.rules.get(name).map(|r| r.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Fail if any descriptor names a family without a registered rule.
    pub fn ensure_registered(&self, descriptors: &[PlaylistDescriptor]) -> Result<()> {
        match descriptors.iter().find(|d| !self.contains(&d.name)) {
            Some(d) => Err(ListenExpectedError::UnknownFamily { name: d.name.clone() }.into()),
            None => Ok(()),
        }
    }

    /// Sanitized file keys of the `name` family for an album's tag string.
    pub fn file_keys(&self, name: &str, tags: &str, replacements: &[Replacement]) -> Result<Vec<String>> {
        let rule = self.get(name).ok_or_else(|| ListenExpectedError::UnknownFamily { name: name.to_string() })?;
        Ok(rule
            .playlist_keys(tags)
            .iter()
            .map(|key| sanitize_path(key, replacements))
            .collect())
    }
}
