//! Error types for the scan layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`FetchError`] - Remote query failures (transport, auth, decoding)
//! - [`LimiterError`] - Rate limiter failures (cancellation, bad config)
//! - [`ScanError`] - Top-level errors surfaced to the host engine
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! End of data is never an error: it is reported as
//! [`crate::ports::Advance::End`].

use thiserror::Error;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Remote query errors.
///
/// These errors originate from a single page request against the remote
/// GraphQL API and are propagated verbatim. Nothing is retried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or connection failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API rejected the credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Non-success HTTP status other than 401.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The GraphQL response carried an `errors` array.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Response could not be decoded into the expected shape.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// The queried user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Request parameters were rejected before anything was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Unauthorized(_) => "unauthorized",
            FetchError::Http { .. } => "http",
            FetchError::GraphQl(_) => "graphql",
            FetchError::Decode(_) => "decode",
            FetchError::UserNotFound(_) => "user_not_found",
            FetchError::InvalidRequest(_) => "invalid_request",
        }
    }
}

// =============================================================================
// Limiter Errors
// =============================================================================

/// Rate limiter errors.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// Shutdown fired while waiting for a token.
    #[error("Rate limiter wait cancelled")]
    Cancelled,

    /// Limiter parameters are unusable.
    #[error("Invalid rate limiter configuration: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// Scan Errors
// =============================================================================

/// Top-level errors returned to the host engine.
///
/// After [`ScanError::Fetch`] or [`ScanError::RateLimit`] the iterator is
/// unusable; further advances return [`ScanError::Poisoned`].
#[derive(Debug, Error)]
pub enum ScanError {
    /// Remote fetch failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Rate limiter wait failed.
    #[error("Rate limit error: {0}")]
    RateLimit(#[from] LimiterError),

    /// A filter the schema declares as required was not supplied.
    #[error("Missing required filter on column '{0}'")]
    MissingRequiredFilter(&'static str),

    /// A constraint value has the wrong type.
    #[error("Invalid constraint on column '{column}': {reason}")]
    InvalidConstraint {
        /// Column name.
        column: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Column index outside the schema.
    #[error("Unknown column index: {0}")]
    UnknownColumn(usize),

    /// `value_at` was called with no row under the cursor.
    #[error("No current row")]
    NoCurrentRow,

    /// The iterator was advanced after it had already failed.
    #[error("Iterator advanced after a previous failure")]
    Poisoned,

    /// Invalid scan configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for remote fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for rate limiter operations.
pub type LimiterResult<T> = Result<T, LimiterError>;

/// Result type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;
