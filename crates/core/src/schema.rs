//! Column schema and value projection for `github_starred_repos`.
//!
//! Columns form a closed enum. A host engine that addresses columns by
//! position goes through [`Column::from_index`]; everything else uses the
//! enum directly so projection is an exhaustive `match`.

use std::fmt;

use serde::Serialize;

use crate::models::{StarredRepoEdge, format_timestamp};

/// Table name exposed to host engines.
pub const TABLE_NAME: &str = "github_starred_repos";

// =============================================================================
// Column Definitions
// =============================================================================

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}

/// Comparison operator of a pushed-down constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    Like,
}

/// Filter a column accepts from the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFilter {
    pub op: ConstraintOp,
    /// The scan cannot run without this filter.
    pub required: bool,
    /// The host may skip re-checking rows against the filter.
    pub omit_check: bool,
}

/// Orderings a column can push down to the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSupport {
    pub asc: bool,
    pub desc: bool,
}

impl OrderSupport {
    pub const NONE: Self = Self {
        asc: false,
        desc: false,
    };
    pub const BOTH: Self = Self {
        asc: true,
        desc: true,
    };

    /// Whether any direction is supported.
    pub fn any(&self) -> bool {
        self.asc || self.desc
    }
}

/// Static description of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub column: Column,
    pub name: &'static str,
    pub ty: ColumnType,
    pub not_null: bool,
    /// Hidden columns only exist to carry a filter argument.
    pub hidden: bool,
    pub filter: Option<ColumnFilter>,
    pub order_by: OrderSupport,
}

/// Columns of `github_starred_repos`, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Login,
    Name,
    Url,
    Description,
    CreatedAt,
    PushedAt,
    UpdatedAt,
    StargazerCount,
    NameWithOwner,
    StarredAt,
}

impl Column {
    /// All columns in declaration order.
    pub const ALL: [Column; 10] = [
        Column::Login,
        Column::Name,
        Column::Url,
        Column::Description,
        Column::CreatedAt,
        Column::PushedAt,
        Column::UpdatedAt,
        Column::StargazerCount,
        Column::NameWithOwner,
        Column::StarredAt,
    ];

    /// Position of the column in the schema.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column at a schema position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Column with the given SQL name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// SQL name of the column.
    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// Static definition of the column.
    pub fn def(self) -> &'static ColumnDef {
        &STARRED_REPOS_COLUMNS[self.index()]
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generate a plain column definition (visible, no filter, no ordering).
macro_rules! plain_column {
    ($column:expr, $name:literal, $ty:expr, $not_null:literal) => {
        ColumnDef {
            column: $column,
            name: $name,
            ty: $ty,
            not_null: $not_null,
            hidden: false,
            filter: None,
            order_by: OrderSupport::NONE,
        }
    };
}

/// Schema of `github_starred_repos`.
///
/// `login` is a hidden, required equality filter carrying the entity key;
/// `starred_at` is the only column the remote API can sort by.
pub static STARRED_REPOS_COLUMNS: [ColumnDef; 10] = [
    ColumnDef {
        column: Column::Login,
        name: "login",
        ty: ColumnType::Text,
        not_null: false,
        hidden: true,
        filter: Some(ColumnFilter {
            op: ConstraintOp::Eq,
            required: true,
            omit_check: true,
        }),
        order_by: OrderSupport::NONE,
    },
    plain_column!(Column::Name, "name", ColumnType::Text, false),
    plain_column!(Column::Url, "url", ColumnType::Text, false),
    plain_column!(Column::Description, "description", ColumnType::Text, false),
    plain_column!(Column::CreatedAt, "created_at", ColumnType::Text, false),
    plain_column!(Column::PushedAt, "pushed_at", ColumnType::Text, false),
    plain_column!(Column::UpdatedAt, "updated_at", ColumnType::Text, false),
    plain_column!(Column::StargazerCount, "stargazer_count", ColumnType::Integer, true),
    plain_column!(Column::NameWithOwner, "name_with_owner", ColumnType::Text, false),
    ColumnDef {
        column: Column::StarredAt,
        name: "starred_at",
        ty: ColumnType::Text,
        not_null: false,
        hidden: false,
        filter: None,
        order_by: OrderSupport::BOTH,
    },
];

// =============================================================================
// Values
// =============================================================================

/// Scalar produced for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Null,
}

impl Value {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// Project one column of an edge.
///
/// `login` is not stored on the edge; the scan's entity key is echoed back
/// so the host sees the filter value it pushed down.
pub fn project(login: &str, edge: &StarredRepoEdge, column: Column) -> Value {
    let repo = &edge.node;
    match column {
        Column::Login => Value::Text(login.to_string()),
        Column::Name => Value::Text(repo.name.clone()),
        Column::Url => Value::Text(repo.url.clone()),
        Column::Description => repo
            .description
            .clone()
            .map_or(Value::Null, Value::Text),
        Column::CreatedAt => timestamp_value(repo.created_at.as_ref()),
        Column::PushedAt => timestamp_value(repo.pushed_at.as_ref()),
        Column::UpdatedAt => timestamp_value(repo.updated_at.as_ref()),
        Column::StargazerCount => Value::Integer(repo.stargazer_count),
        Column::NameWithOwner => Value::Text(repo.name_with_owner.clone()),
        Column::StarredAt => timestamp_value(edge.starred_at.as_ref()),
    }
}

fn timestamp_value(ts: Option<&chrono::DateTime<chrono::Utc>>) -> Value {
    ts.map_or(Value::Null, |t| Value::Text(format_timestamp(t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StarredRepo;

    fn edge() -> StarredRepoEdge {
        StarredRepoEdge {
            starred_at: Some("2021-05-01T00:00:00Z".parse().unwrap()),
            node: StarredRepo {
                name: "linguist".into(),
                url: "https://github.com/github/linguist".into(),
                description: None,
                created_at: Some("2011-05-09T22:53:13Z".parse().unwrap()),
                pushed_at: None,
                updated_at: Some("2021-04-30T10:00:00Z".parse().unwrap()),
                stargazer_count: 10_000,
                name_with_owner: "github/linguist".into(),
            },
        }
    }

    // Test critique: l'ordre des colonnes est le contrat avec le moteur hôte
    #[test]
    fn test_column_index_matches_declaration_order() {
        for (i, def) in STARRED_REPOS_COLUMNS.iter().enumerate() {
            assert_eq!(def.column.index(), i);
            assert_eq!(Column::from_index(i), Some(def.column));
            assert_eq!(Column::from_name(def.name), Some(def.column));
        }
        assert_eq!(Column::from_index(10), None);
        assert_eq!(Column::from_name("stars"), None);
    }

    #[test]
    fn test_schema_declares_single_key_and_order_column() {
        let required: Vec<_> = STARRED_REPOS_COLUMNS
            .iter()
            .filter(|d| d.filter.is_some_and(|f| f.required))
            .collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].column, Column::Login);
        assert!(required[0].hidden);

        let orderable: Vec<_> = STARRED_REPOS_COLUMNS
            .iter()
            .filter(|d| d.order_by.any())
            .collect();
        assert_eq!(orderable.len(), 1);
        assert_eq!(orderable[0].column, Column::StarredAt);
    }

    #[test]
    fn test_projection_types_and_nulls() {
        let edge = edge();
        assert_eq!(project("octocat", &edge, Column::Login), Value::Text("octocat".into()));
        assert_eq!(
            project("octocat", &edge, Column::StarredAt),
            Value::Text("2021-05-01T00:00:00Z".into())
        );
        assert_eq!(project("octocat", &edge, Column::PushedAt), Value::Null);
        assert_eq!(project("octocat", &edge, Column::Description), Value::Null);
        assert_eq!(
            project("octocat", &edge, Column::StargazerCount),
            Value::Integer(10_000)
        );
    }

    #[test]
    fn test_value_serializes_untagged() {
        let row = vec![Value::Text("a".into()), Value::Integer(3), Value::Null];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"["a",3,null]"#);
    }
}
