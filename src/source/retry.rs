//! Retry configuration, delay calculation, and the retrying source decorator.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and
//! [`RetryingPageSource`], which wraps any [`PageSource`] with automatic
//! retry on transient errors. The loop itself lives in [`with_retry()`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;
use url::Url;

use super::PageSource;
use crate::error::FetchError;
use crate::telemetry;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional full jitter:
///
/// ```rust
/// # use cinescrape::source::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(true);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth and
    /// `Retry-After` hints). Default: 30s.
    pub max_delay: Duration,
    /// Whether to draw each delay uniformly from `[0, backoff]`. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the backoff ceiling for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    /// Does NOT include jitter; see [`effective_delay()`](Self::effective_delay)
    /// for the full calculation.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the delay to sleep before the next attempt.
    ///
    /// A `retry_after` hint from the upstream (HTTP 429) takes precedence
    /// over the computed backoff, capped at `max_delay`. Otherwise, with
    /// jitter enabled, the delay is drawn uniformly from
    /// `[0, delay_for_attempt(attempt)]` ("full jitter").
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_delay);
        }
        let ceiling = self.delay_for_attempt(attempt);
        if self.jitter {
            full_jitter(ceiling)
        } else {
            ceiling
        }
    }
}

fn full_jitter(ceiling: Duration) -> Duration {
    let nanos = u64::try_from(ceiling.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}

/// Execute an async fetch with retry logic.
///
/// Retries on transient errors (as classified by [`FetchError::is_transient()`])
/// up to `config.max_attempts`, sleeping [`RetryConfig::effective_delay()`]
/// between attempts. Terminal errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    source_name: &str,
    f: F,
) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL, "source" => source_name.to_owned())
                        .increment(1);
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        source = source_name,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // terminal, no retry
        }
    }
    Err(last_err.unwrap_or_else(|| FetchError::Connection("no attempt made".into())))
}

/// Decorator that wraps a [`PageSource`] with retry logic.
///
/// On transient errors, retries with exponential backoff up to
/// `config.max_attempts`, honouring `Retry-After` hints. `NotFound` and
/// `Blocked` are returned immediately.
pub struct RetryingPageSource {
    inner: Arc<dyn PageSource>,
    config: RetryConfig,
}

impl RetryingPageSource {
    /// Wrap a page source with retry logic.
    pub fn new(inner: Arc<dyn PageSource>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl PageSource for RetryingPageSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        with_retry(&self.config, self.inner.name(), || self.inner.fetch(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(500))
            .max_delay(Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(3));
    }

    #[test]
    fn full_jitter_stays_within_ceiling() {
        let config = RetryConfig::new().jitter(true);
        for attempt in 0..5 {
            let ceiling = config.delay_for_attempt(attempt);
            for _ in 0..50 {
                assert!(config.effective_delay(attempt, None) <= ceiling);
            }
        }
    }

    #[test]
    fn retry_after_wins_and_is_capped() {
        let config = RetryConfig::new().max_delay(Duration::from_secs(10));
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(120))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn zero_ceiling_jitter_is_zero() {
        assert_eq!(full_jitter(Duration::ZERO), Duration::ZERO);
    }
}
