//! Pagination types for the remote connection.
//!
//! The remote API uses Relay-style cursor pagination: each page carries
//! a `hasNextPage` flag and an opaque end cursor to resume from.

use serde::Serialize;

/// Opaque cursor for pagination.
///
/// The cursor value is produced by the remote API and must be treated
/// as an opaque token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub value: String,
}

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// One page of a paginated connection, normalized.
///
/// `has_next_page` is the authoritative continuation signal; `end_cursor`
/// may be absent even when the flag is set, and is ignored once it is not.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items in the order the remote API returned them.
    pub edges: Vec<T>,
    /// Whether there are more items after this page.
    pub has_next_page: bool,
    /// Cursor of the last item in this page.
    pub end_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Ordering direction for sorted queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    /// Ascending order (oldest first).
    #[default]
    Asc,
    /// Descending order (newest first).
    Desc,
}

impl OrderDirection {
    /// Map a host engine's `desc` flag.
    pub fn from_desc(desc: bool) -> Self {
        if desc { Self::Desc } else { Self::Asc }
    }
}

/// Fields the starred repositories connection can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StarOrderField {
    StarredAt,
}

/// `StarOrder` input of the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarOrder {
    pub field: StarOrderField,
    pub direction: OrderDirection,
}
