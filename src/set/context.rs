use bson::Document;
use std::time::Duration;

use crate::errors::DbError;
use crate::filter::{Filter, compile_match};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// `"asc"` in any case is ascending; every other string resolves to descending.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") { Self::Ascending } else { Self::Descending }
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

/// Per-query state collected by a [`super::Set`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub table: String,
    pub filter: Option<Filter>,
    pub pipe: Option<Vec<Document>>,
    pub sort: Option<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub timeout: Duration,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self {
            table: String::new(),
            filter: None,
            pipe: None,
            sort: None,
            skip: None,
            limit: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl QueryContext {
    /// The compiled filter; an unset filter is the empty (match-all) document.
    ///
    /// # Errors
    /// Propagates compile errors from the stored filter tree.
    pub fn match_document(&self) -> Result<Document, DbError> {
        self.filter.as_ref().map_or_else(|| Ok(Document::new()), compile_match)
    }

    pub(crate) fn require_table(&self) -> Result<&str, DbError> {
        if self.table.is_empty() {
            return Err(DbError::config("table name not defined"));
        }
        Ok(&self.table)
    }
}
