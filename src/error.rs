//! Cinescrape error types

use std::time::Duration;

/// Failure to retrieve a page from the upstream site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    /// 404 or 410. Treated as a confirmed "no results" outcome.
    #[error("page not found")]
    NotFound,

    /// A 4xx other than 404/410/429: the upstream refuses to serve us.
    #[error("blocked by upstream (HTTP {status})")]
    Blocked { status: u16 },

    #[error("upstream server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("rate limited by upstream, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("connection error: {0}")]
    Connection(String),
}

impl FetchError {
    /// Whether a fresh attempt may succeed.
    ///
    /// Timeouts, 5xx, 429 and connection failures are transient.
    /// `NotFound` and `Blocked` are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout
                | FetchError::ServerError { .. }
                | FetchError::RateLimited { .. }
                | FetchError::Connection(_)
        )
    }

    /// Upstream-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Failure to turn a fetched page into movie records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// No extraction strategy recognized the page.
    #[error("page structure not recognized")]
    StructureChanged,

    /// The page explicitly reports that nothing matched the query.
    #[error("page reports no matching titles")]
    NoMatch,
}

/// Cinescrape error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum CinescrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// A spawned lookup task panicked or was aborted.
    #[error("lookup task failed: {0}")]
    TaskFailed(String),
}

impl CinescrapeError {
    /// Whether this error should be shown to the user as "try again later".
    ///
    /// Negative outcomes never reach here: `NotFound` and `NoMatch` are
    /// turned into negative cache entries by the lookup pipeline.
    pub fn is_temporary(&self) -> bool {
        !matches!(self, CinescrapeError::Configuration(_))
    }
}

/// Result type alias for Cinescrape operations
pub type Result<T> = std::result::Result<T, CinescrapeError>;
