//! Port trait for the request budget.
//!
//! One limiter is shared by every iterator in the process and is injected
//! at construction. Waiting can be cut short by a [`Shutdown`] signal.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::LimiterResult;

/// Cancellation signal backed by a `watch` channel.
///
/// The sender flips the value to `true` on shutdown. A dropped sender
/// means the signal can never fire.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Port trait for a blocking request gate.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until one request may be issued.
    ///
    /// Returns [`crate::error::LimiterError::Cancelled`] if `shutdown` fires
    /// first; no token is consumed in that case.
    async fn wait(&self, shutdown: &mut Shutdown) -> LimiterResult<()>;
}
