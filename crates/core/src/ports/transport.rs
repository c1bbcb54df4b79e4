//! Port trait for the remote GraphQL API.
//!
//! The page fetch function owns the query template and the decoding of
//! `data`; a transport only moves one request over the wire and handles
//! authentication. Implementations live in the adapter layer (e.g.,
//! `stargaze-github`).

use async_trait::async_trait;

use crate::error::FetchResult;

/// Port trait for executing GraphQL requests.
#[async_trait]
pub trait GraphQLTransport: Send + Sync {
    /// Execute one query and return its `data` object.
    ///
    /// GraphQL-level `errors`, HTTP failures and authentication failures
    /// are all reported as [`crate::error::FetchError`]. Implementations
    /// must not retry.
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> FetchResult<serde_json::Value>;
}
