//! Process-wide token bucket for upstream requests.
//!
//! One [`RateLimiter`] is created at startup and shared (via `Arc`) by every
//! page source that talks to the upstream site. It is the only piece of
//! global, intentionally shared state in the pipeline, so it is injected
//! rather than stored in a static.
//!
//! Tokens are reserved under a short, non-async lock: the bucket balance may
//! go negative, and the caller then sleeps off its share of the debt outside
//! the lock. Concurrent callers are therefore spaced out in reservation
//! order without any of them holding a lock across `.await`.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Configuration for the upstream rate limiter.
///
/// ```rust
/// # use cinescrape::source::RateLimitConfig;
/// let config = RateLimitConfig::new().requests_per_second(2.0).burst(4);
/// assert_eq!(config.burst, 4);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained request rate. Default: 1.0.
    pub requests_per_second: f64,
    /// Bucket capacity, i.e. how many requests may go out back to back
    /// after an idle period. Default: 1.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            burst: 1,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests_per_second(mut self, rate: f64) -> Self {
        self.requests_per_second = rate;
        self
    }

    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    updated: Instant,
}

/// Token-bucket rate limiter shared by all upstream requests.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    ///
    /// Non-positive rates and a zero burst are clamped to the smallest
    /// usable values; configuration validation rejects them earlier.
    pub fn new(config: &RateLimitConfig) -> Self {
        let rate = if config.requests_per_second > 0.0 {
            config.requests_per_second
        } else {
            f64::MIN_POSITIVE
        };
        let capacity = f64::from(config.burst.max(1));
        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                updated: Instant::now(),
            }),
        }
    }

    /// Wait until one request may be sent.
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter wait");
            tokio::time::sleep(wait).await;
        }
    }

    /// Take one token and return how long the caller must wait before using it.
    fn reserve(&self) -> Duration {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.updated = now;
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-bucket.tokens / self.rate).unwrap_or(Duration::MAX)
        }
    }
}
