use crate::query::{parse_query_string, Query, QuerySyntaxError, Sort};

pub const YEAR_PATTERN: &str = "[1-2][0-9]{3}";
pub const MONTH_PATTERN: &str = "[1-2][0-9]{3}-(?:0[1-9]|1[0-2])";

pub const BY_MONTH: &str = "by_month";
pub const BY_YEAR: &str = "by_year";

/// A smart playlist family: its name and the query selecting the albums that belong to it.
///
/// Descriptors are plain values. The query is parsed again on every access, which keeps them
/// hashable and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaylistDescriptor {
    pub name: String,
    pub query_expression: String,
}

impl PlaylistDescriptor {
    pub fn new(name: &str, query_expression: &str) -> Self {
        PlaylistDescriptor {
            name: name.to_string(),
            query_expression: query_expression.to_string(),
        }
    }

    pub fn query(&self) -> Result<Query, QuerySyntaxError> {
        Ok(self.query_and_sort()?.0)
    }

    pub fn sort(&self) -> Result<Sort, QuerySyntaxError> {
        Ok(self.query_and_sort()?.1)
    }

    pub fn query_and_sort(&self) -> Result<(Query, Sort), QuerySyntaxError> {
        parse_query_string(&self.query_expression)
    }
}

/// The families shipped with the crate, ordered by name.
pub fn builtin_descriptors() -> Vec<PlaylistDescriptor> {
    vec![
        PlaylistDescriptor::new(BY_MONTH, &format!("playlists::{MONTH_PATTERN}")),
        PlaylistDescriptor::new(BY_YEAR, &format!("playlists::{YEAR_PATTERN}")),
    ]
}
