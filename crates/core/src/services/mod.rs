//! Scan services: pushdown planning, page fetching, rate limiting and
//! the row iterator that ties them together.

mod fetch;
mod iterator;
mod limiter;
mod plan;

pub use fetch::{FetchOptions, MAX_PAGE_SIZE, STARRED_REPOS_QUERY, fetch_starred_repos};
pub use iterator::{IteratorState, ScanConfig, StarredReposIterator};
pub use limiter::{RateLimiterConfig, TokenBucket, Unlimited};
pub use plan::{Constraint, OrderBy, ScanPlan, plan_scan};
