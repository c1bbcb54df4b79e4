//! Process-wide request budget.
//!
//! [`TokenBucket`] refills one token per `interval` up to `burst` and starts
//! full. It is shared behind an `Arc` by every iterator; waiters contend on a
//! single async mutex and sleep outside of it.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::error::{LimiterError, LimiterResult};
use crate::ports::{RateLimiter, Shutdown};

/// Configuration for the token bucket.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Time to earn one token.
    pub interval: Duration,
    /// Maximum number of tokens held.
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            burst: 1,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, interval: Duration, burst: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / interval.as_nanos();
        if earned == 0 {
            return;
        }

        let room = u128::from(burst - self.tokens);
        if earned >= room {
            self.tokens = burst;
            self.last_refill = now;
        } else {
            // earned < burst here, so it fits in u32
            let earned = earned as u32;
            self.tokens += earned;
            self.last_refill += interval * earned;
        }
    }
}

/// Token bucket rate limiter.
#[derive(Debug)]
pub struct TokenBucket {
    interval: Duration,
    burst: u32,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimiterConfig) -> LimiterResult<Self> {
        if config.burst == 0 {
            return Err(LimiterError::InvalidConfig("burst must be at least 1".into()));
        }
        if config.interval.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "interval must be non-zero".into(),
            ));
        }

        Ok(Self {
            interval: config.interval,
            burst: config.burst,
            state: Mutex::new(BucketState {
                tokens: config.burst,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Take a token if one is available, otherwise return the time until
    /// the next one.
    async fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.refill(now, self.interval, self.burst);

        if state.tokens > 0 {
            state.tokens -= 1;
            return Ok(());
        }
        Err((state.last_refill + self.interval).saturating_duration_since(now))
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn wait(&self, shutdown: &mut Shutdown) -> LimiterResult<()> {
        loop {
            if shutdown.is_cancelled() {
                return Err(LimiterError::Cancelled);
            }

            let delay = match self.try_acquire().await {
                Ok(()) => return Ok(()),
                Err(delay) => delay,
            };
            trace!(delay_ms = delay.as_millis(), "Waiting for rate limiter token");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Err(LimiterError::Cancelled),
            }
        }
    }
}

/// Limiter that never waits. Still honours shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn wait(&self, shutdown: &mut Shutdown) -> LimiterResult<()> {
        if shutdown.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }
        Ok(())
    }
}
