//! Domain models for starred repository edges.
//!
//! These models mirror the GitHub `StarredRepositoryEdge` and `Repository`
//! shapes and are decoded straight from the GraphQL response.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Timestamps
// =============================================================================

/// Unix seconds of `0001-01-01T00:00:00Z`, the zero value some GraphQL
/// clients emit for unset timestamps.
const ZERO_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// Whether a timestamp is the zero value (unset).
pub fn is_zero_timestamp(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == ZERO_TIMESTAMP_SECS && ts.timestamp_subsec_nanos() == 0
}

/// Render a timestamp as RFC-3339 with a `Z` suffix.
///
/// Fractional seconds are only printed when non-zero, so
/// `2021-05-01T00:00:00Z` renders back to itself.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Decode a nullable timestamp, folding the zero value into `None`.
fn nullable_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let ts = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(ts.filter(|t| !is_zero_timestamp(t)))
}

// =============================================================================
// Starred Repositories
// =============================================================================

/// Repository node attached to a starred edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredRepo {
    /// Repository name.
    pub name: String,
    /// HTML URL.
    pub url: String,
    /// Free-form description (nullable upstream).
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time.
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last push; absent for repositories that never received one.
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub pushed_at: Option<DateTime<Utc>>,
    /// Last update.
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of stargazers.
    pub stargazer_count: i64,
    /// `owner/name`.
    pub name_with_owner: String,
}

/// A starred repository plus the time the user starred it.
///
/// `starred_at` belongs to the relationship, not to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredRepoEdge {
    /// When the repository was starred.
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub starred_at: Option<DateTime<Utc>>,
    /// The starred repository.
    pub node: StarredRepo,
}

// =============================================================================
// Tests
// =============================================================================
