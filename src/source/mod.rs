//! Page sources: everything between a search URL and raw HTML bytes.
//!
//! Sources implement [`PageSource`] rather than being called as a concrete
//! client. This enables:
//! - Decorators: [`RetryingPageSource`] wraps any source with backoff
//! - Deterministic fakes in tests, with no network and no rate limiting
//!
//! The production stack is `RetryingPageSource(HttpPageSource)`, with the
//! process-wide [`RateLimiter`] injected into the HTTP source so that every
//! attempt, including retries, spends a token.

pub mod http;
pub mod rate_limit;
pub mod retry;
pub mod template;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;

pub use http::{HttpConfig, HttpPageSource};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::{RetryConfig, RetryingPageSource};
pub use template::SearchUrlTemplate;

/// Something that can fetch the raw bytes of an upstream page.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Source name for logging/metrics.
    fn name(&self) -> &str;

    /// Fetch the page at `url`.
    ///
    /// Returns the body of a 2xx response. Every other outcome is a
    /// [`FetchError`]; see [`FetchError::is_transient()`] for which ones a
    /// caller may retry.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}
