//! Builder for configuring lookup pipelines

use std::sync::Arc;

use super::MovieLookup;
use crate::cache::{CacheConfig, ResultCache};
use crate::extract::{Extractor, SelectorConfig};
use crate::source::{
    HttpConfig, HttpPageSource, PageSource, RateLimitConfig, RateLimiter, RetryConfig,
    RetryingPageSource, SearchUrlTemplate,
};
use crate::{CinescrapeError, Result};

/// Main entry point for creating lookup pipelines.
pub struct Cinescrape;

impl Cinescrape {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> LookupBuilder {
        LookupBuilder::new()
    }
}

/// Builder for [`MovieLookup`].
///
/// ```rust
/// # use cinescrape::{Cinescrape, RetryConfig};
/// let lookup = Cinescrape::builder()
///     .search_url("https://movies.example/search?q={query}")
///     .retry(RetryConfig::new().max_attempts(5))
///     .build()
///     .unwrap();
/// assert!(lookup.cache().is_empty());
/// ```
pub struct LookupBuilder {
    search_url: Option<String>,
    http: HttpConfig,
    retry: RetryConfig,
    rate_limit: RateLimitConfig,
    cache: CacheConfig,
    selectors: SelectorConfig,
    page_source: Option<Arc<dyn PageSource>>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl Default for LookupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupBuilder {
    pub fn new() -> Self {
        Self {
            search_url: None,
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            selectors: SelectorConfig::default(),
            page_source: None,
            rate_limiter: None,
        }
    }

    /// Search URL template containing a `{query}` placeholder.
    pub fn search_url(mut self, template: impl Into<String>) -> Self {
        self.search_url = Some(template.into());
        self
    }

    pub fn http(mut self, config: HttpConfig) -> Self {
        self.http = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn selectors(mut self, config: SelectorConfig) -> Self {
        self.selectors = config;
        self
    }

    /// Share an existing rate limiter (e.g. across several pipelines).
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Replace the HTTP source. Retries still apply; rate limiting is the
    /// custom source's responsibility.
    pub fn page_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.page_source = Some(source);
        self
    }

    /// Build the pipeline.
    ///
    /// Fails if no search URL was configured, the template is invalid, a
    /// selector does not compile, or the HTTP client cannot be created.
    pub fn build(self) -> Result<MovieLookup> {
        let search_url = self.search_url.ok_or_else(|| {
            CinescrapeError::Configuration("no search URL configured".to_string())
        })?;
        let template = SearchUrlTemplate::new(search_url)?;
        let extractor = Extractor::new(&self.selectors)?;

        let inner: Arc<dyn PageSource> = match self.page_source {
            Some(source) => source,
            None => {
                let limiter = self
                    .rate_limiter
                    .unwrap_or_else(|| Arc::new(RateLimiter::new(&self.rate_limit)));
                Arc::new(HttpPageSource::new(&self.http, limiter)?)
            }
        };
        let source: Arc<dyn PageSource> = Arc::new(RetryingPageSource::new(inner, self.retry));

        Ok(MovieLookup::new(
            source,
            extractor,
            template,
            ResultCache::new(&self.cache),
        ))
    }
}
