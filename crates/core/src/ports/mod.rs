//! Port traits and shared types.
//!
//! Ports define the interfaces adapters implement (remote transport, rate
//! limiter) and the interface host engines consume (row source).

mod pagination;
mod rate_limiter;
mod row_source;
mod transport;

pub use pagination::*;
pub use rate_limiter::*;
pub use row_source::*;
pub use transport::*;
