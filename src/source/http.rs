//! reqwest-backed page source for the upstream movie site.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, redirect::Policy};
use url::Url;

use super::{PageSource, RateLimiter};
use crate::error::FetchError;
use crate::telemetry;
use crate::{CinescrapeError, Result};

/// Default user agent sent upstream.
pub const DEFAULT_USER_AGENT: &str = concat!("cinescrape/", env!("CARGO_PKG_VERSION"));

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string. Default: `cinescrape/<version>`.
    pub user_agent: String,
    /// Whole-request timeout. Default: 10s.
    pub request_timeout: Duration,
    /// Connection establishment timeout. Default: 5s.
    pub connect_timeout: Duration,
    /// Maximum redirects to follow. Default: 5.
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_redirects: 5,
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Page source that issues real HTTP GET requests.
///
/// Every request first takes a token from the shared [`RateLimiter`].
/// Responses are classified into [`FetchError`] variants; retrying is left
/// to [`RetryingPageSource`](super::RetryingPageSource).
#[derive(Clone)]
pub struct HttpPageSource {
    http: Client,
    limiter: Arc<RateLimiter>,
}

impl HttpPageSource {
    /// Build the HTTP client. Fails only on TLS backend initialisation.
    pub fn new(config: &HttpConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| {
                CinescrapeError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, limiter })
    }

    async fn send(&self, url: &Url) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(classify_transport)?;
            return Ok(body.to_vec());
        }

        Err(classify_status(
            status.as_u16(),
            parse_retry_after(response.headers()),
        ))
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &Url) -> std::result::Result<Vec<u8>, FetchError> {
        self.limiter.acquire().await;

        let start = Instant::now();
        let outcome = self.send(url).await;
        metrics::histogram!(telemetry::FETCH_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        metrics::counter!(telemetry::FETCHES_TOTAL, "outcome" => outcome_label(&outcome))
            .increment(1);

        if let Err(ref e) = outcome {
            tracing::debug!(url = %url, error = %e, "upstream fetch failed");
        }
        outcome
    }
}

/// Map a non-2xx status code to a [`FetchError`].
pub fn classify_status(status: u16, retry_after: Option<Duration>) -> FetchError {
    match status {
        404 | 410 => FetchError::NotFound,
        429 => FetchError::RateLimited { retry_after },
        500..=599 => FetchError::ServerError { status },
        // remaining 4xx, plus 3xx left over after the redirect limit
        _ => FetchError::Blocked { status },
    }
}

fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Connection(err.to_string())
    }
}

/// Parse a `Retry-After` header in delta-seconds form.
///
/// The HTTP-date form is not supported and yields `None`, which falls back
/// to the normal backoff schedule.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn outcome_label(outcome: &std::result::Result<Vec<u8>, FetchError>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(FetchError::NotFound) => "not_found",
        Err(FetchError::Blocked { .. }) => "blocked",
        Err(FetchError::ServerError { .. }) => "server_error",
        Err(FetchError::RateLimited { .. }) => "rate_limited",
        Err(FetchError::Timeout) => "timeout",
        Err(FetchError::Connection(_)) => "connection",
    }
}
