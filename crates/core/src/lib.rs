//! Core scan layer for Stargaze.
//!
//! This crate adapts the paginated GitHub `starredRepositories` connection
//! into a pull-based row source a tabular query engine can scan. It follows
//! hexagonal architecture principles: transport and host engine live
//! outside, behind port traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     stargaze (binary)                       │
//! │            CLI host: constraints, order-bys, output         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     stargaze-github                         │
//! │                 (GraphQL over HTTPS)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    stargaze-core  ← YOU ARE HERE            │
//! │         (models, schema, ports, planner, iterator)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Starred repository edges as decoded from the API
//! - [`schema`] - Column definitions, values and projection
//! - [`ports`] - Transport, rate limiter and row source traits
//! - [`services`] - Planner, page fetch, token bucket, row iterator
//! - [`error`] - Error types
//! - [`metrics`] - Metric definitions
//!
//! # Scan Lifecycle
//!
//! 1. The host offers constraints and order-bys; [`services::plan_scan`]
//!    fixes the login and remote ordering
//! 2. [`services::StarredReposIterator`] is built with a shared rate limiter
//! 3. Each [`ports::RowSource::advance`] serves the next edge, fetching a new
//!    page (one limiter token each) when the current one is consumed
//! 4. The host reads cells with [`ports::RowSource::value_at`]

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod schema;
pub mod services;
