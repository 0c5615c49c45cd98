//! The query module provides the small album query language used by playlist descriptors and by
//! the membership commands.
//!
//! A query is a whitespace separated list of terms that must all match:
//!
//! - `rock` matches albums whose artist, title or genre contain `rock` (case insensitive),
//! - `genre:rock` restricts the substring match to one field,
//! - `playlists::^2024` matches the field against a regular expression,
//! - `^genre:rock` negates a term,
//! - `year+` / `year-` sort ascending or descending by a field.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::error::ListenExpectedError;
use crate::library::{Album, FieldValue};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct QuerySyntaxError {
    query: String,
    index: usize,
    feedback: String,
}

impl fmt::Display for QuerySyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse query, invalid syntax:\n\n    {}\n    {}^\n    {}{}",
            self.query,
            " ".repeat(self.index),
            " ".repeat(self.index),
            self.feedback
        )
    }
}

impl From<QuerySyntaxError> for ListenExpectedError {
    fn from(err: QuerySyntaxError) -> Self {
        ListenExpectedError::InvalidQuery(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    AlbumArtist,
    Album,
    Year,
    Genre,
    Playlists,
    Listen,
    PlaysNb,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Id,
        Field::AlbumArtist,
        Field::Album,
        Field::Year,
        Field::Genre,
        Field::Playlists,
        Field::Listen,
        Field::PlaysNb,
    ];

    /// Fields searched by a bare term.
    pub const DEFAULT_SEARCH: [Field; 3] = [Field::AlbumArtist, Field::Album, Field::Genre];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::AlbumArtist => "albumartist",
            Field::Album => "album",
            Field::Year => "year",
            Field::Genre => "genre",
            Field::Playlists => "playlists",
            Field::Listen => "listen",
            Field::PlaysNb => "plays_nb",
        }
    }

    pub fn parse(s: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case insensitive substring. The needle is stored lowercased.
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Matcher::Substring(needle) => haystack.to_lowercase().contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(haystack),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Term {
    /// The term matches if any of these fields match. Only bare terms have more than one.
    pub fields: Vec<Field>,
    pub matcher: Matcher,
    pub negate: bool,
}

impl Term {
    pub fn matches(&self, album: &Album) -> bool {
        let hit = self.fields.iter().any(|field| {
            match album.get(*field) {
                Some(value) => self.matcher.is_match(&value.to_string()),
                // Absent attributes behave like the empty string, so `playlists::` style regexes
                // still get a chance to match (or not) against them.
                None => match &self.matcher {
                    Matcher::Regex(re) => re.is_match(""),
                    Matcher::Substring(needle) => needle.is_empty(),
                },
            }
        });
        hit != self.negate
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            write!(f, "^")?;
        }
        if self.fields.len() == 1 {
            write!(f, "{}:", self.fields[0])?;
        }
        match &self.matcher {
            Matcher::Substring(needle) => write!(f, "{needle}"),
            Matcher::Regex(re) => write!(f, ":{}", re.as_str()),
        }
    }
}

/// A conjunction of terms. The empty query matches every album.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub terms: Vec<Term>,
}

impl Query {
    pub fn matches(&self, album: &Album) -> bool {
        self.terms.iter().all(|t| t.matches(album))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms = self.terms.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        write!(f, "{}", terms.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: Field,
    pub ascending: bool,
}

/// Sort order of a query's results. An empty sort leaves the store's default order alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub keys: Vec<SortKey>,
}

impl Sort {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &Album, b: &Album) -> Ordering {
        for key in &self.keys {
            let ord = cmp_values(a.get(key.field), b.get(key.field));
            let ord = if key.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable sort, so albums that compare equal keep the store's order.
    pub fn apply(&self, albums: &mut [Album]) {
        if !self.is_empty() {
            albums.sort_by(|a, b| self.compare(a, b));
        }
    }
}

fn cmp_values(a: Option<FieldValue>, b: Option<FieldValue>) -> Ordering {
    match (a, b) {
        (Some(FieldValue::Text(a)), Some(FieldValue::Text(b))) => a.to_lowercase().cmp(&b.to_lowercase()),
        (a, b) => a.cmp(&b),
    }
}

pub fn parse_query_string(raw: &str) -> Result<(Query, Sort), QuerySyntaxError> {
    let tokens = split_query(raw).map_err(|index| QuerySyntaxError {
        query: raw.to_string(),
        index,
        feedback: "Unterminated quote.".to_string(),
    })?;
    parse_tokens(raw, tokens)
}

pub fn parse_query_parts(parts: &[String]) -> Result<(Query, Sort), QuerySyntaxError> {
    let raw = parts.join(" ");
    let mut offset = 0;
    let mut tokens = Vec::with_capacity(parts.len());
    for part in parts {
        tokens.push((offset, part.clone()));
        offset += part.len() + 1;
    }
    parse_tokens(&raw, tokens)
}

fn parse_tokens(raw: &str, tokens: Vec<(usize, String)>) -> Result<(Query, Sort), QuerySyntaxError> {
    let mut query = Query::default();
    let mut sort = Sort::default();

    for (idx, token) in tokens {
        if let Some(key) = parse_sort_key(&token) {
            sort.keys.push(key);
            continue;
        }

        let (negate, body, mut idx) = match token.strip_prefix('^') {
            Some(rest) => (true, rest, idx + 1),
            None => (false, token.as_str(), idx),
        };

        let (fields, pattern) = match body.split_once(':') {
            Some((name, pattern)) => {
                let field = Field::parse(name).ok_or_else(|| {
                    let all_fields = Field::ALL.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ");
                    QuerySyntaxError {
                        query: raw.to_string(),
                        index: idx,
                        feedback: format!("Invalid field: must be one of {{{all_fields}}}."),
                    }
                })?;
                idx += name.len() + 1;
                (vec![field], pattern)
            }
            None => (Field::DEFAULT_SEARCH.to_vec(), body),
        };

        let matcher = match pattern.strip_prefix(':') {
            Some(re) => Matcher::Regex(Regex::new(re).map_err(|e| QuerySyntaxError {
                query: raw.to_string(),
                index: idx + 1,
                feedback: format!("Invalid regular expression: {e}"),
            })?),
            None => Matcher::Substring(pattern.to_lowercase()),
        };

        query.terms.push(Term { fields, matcher, negate });
    }

    tracing::debug!("Parsed query raw={} as query={} sort={:?}", raw, query, sort);
    Ok((query, sort))
}

fn parse_sort_key(token: &str) -> Option<SortKey> {
    let ascending = match token.chars().last()? {
        '+' => true,
        '-' => false,
        _ => return None,
    };
    let field = Field::parse(&token[..token.len() - 1])?;
    Some(SortKey { field, ascending })
}

/// Split a query string on whitespace, honoring single and double quotes. Returns each token
/// with its byte offset, or the offset of an unterminated quote.
fn split_query(raw: &str) -> Result<Vec<(usize, String)>, usize> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, String)> = None;
    let mut quote: Option<(char, usize)> = None;

    for (i, c) in raw.char_indices() {
        match quote {
            Some((q, _)) if c == q => quote = None,
            Some(_) => current.get_or_insert_with(|| (i, String::new())).1.push(c),
            None if c == '"' || c == '\'' => {
                current.get_or_insert_with(|| (i, String::new()));
                quote = Some((c, i));
            }
            None if c.is_whitespace() => {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
            }
            None => current.get_or_insert_with(|| (i, String::new())).1.push(c),
        }
    }

    if let Some((_, i)) = quote {
        return Err(i);
    }
    if let Some(token) = current {
        tokens.push(token);
    }
    Ok(tokens)
}
