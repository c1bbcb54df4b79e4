//! GitHub GraphQL adapter for Stargaze.
//!
//! This crate implements the [`GraphQLTransport`] port from `stargaze-core`,
//! posting queries to the GitHub GraphQL API over HTTPS.
//!
//! # Usage
//!
//! ```ignore
//! use stargaze_github::{GitHubClient, GitHubClientConfig};
//!
//! let client = GitHubClient::new(GitHubClientConfig {
//!     token: std::env::var("GITHUB_TOKEN").ok(),
//!     ..Default::default()
//! })?;
//! let data = client.execute(query, variables).await?;
//! ```
//!
//! The client only moves bytes and authenticates. Query templates, page
//! decoding and rate limiting belong to `stargaze-core`.
//!
//! [`GraphQLTransport`]: stargaze_core::ports::GraphQLTransport

mod client;

pub use client::{DEFAULT_ENDPOINT, GitHubClient, GitHubClientConfig};
