//! The lookup pipeline: query key → cached or freshly scraped records.
//!
//! ```text
//! QueryKey ─► ResultCache ──hit──────────────────────────────► CacheEntry
//!                 │ miss (coalesced per key)
//!                 ▼
//!        SearchUrlTemplate ─► PageSource ─► Extractor ─► put ─► CacheEntry
//! ```
//!
//! Outcome mapping:
//! - records found: `Fresh` entry
//! - `NotFound`, `NoMatch`, or an empty result list: `Negative` entry
//! - `StructureChanged`: one re-fetch, then an error
//! - any other failure: an error, and nothing is cached

mod builder;

use std::sync::Arc;

use futures_util::FutureExt;

use crate::cache::{CacheEntry, EntryStatus, ResultCache};
use crate::error::{FetchError, ParseError};
use crate::extract::Extractor;
use crate::source::{PageSource, SearchUrlTemplate};
use crate::types::QueryKey;
use crate::Result;

pub use builder::{Cinescrape, LookupBuilder};

struct LookupInner {
    source: Arc<dyn PageSource>,
    extractor: Extractor,
    template: SearchUrlTemplate,
    cache: ResultCache,
}

/// Cache-fronted movie search.
///
/// Cheap to clone; clones share the cache, rate limiter, and in-flight
/// registry.
#[derive(Clone)]
pub struct MovieLookup {
    inner: Arc<LookupInner>,
}

impl MovieLookup {
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: Extractor,
        template: SearchUrlTemplate,
        cache: ResultCache,
    ) -> Self {
        Self {
            inner: Arc::new(LookupInner {
                source,
                extractor,
                template,
                cache,
            }),
        }
    }

    /// Create a builder wired with the HTTP page source.
    pub fn builder() -> LookupBuilder {
        LookupBuilder::new()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    /// Resolve `key` to a cache entry.
    ///
    /// A cached entry is returned as-is; a `Stale` one additionally
    /// triggers a background refresh. On a miss the page is fetched and
    /// parsed, with concurrent lookups for the same key sharing one fetch.
    pub async fn lookup(&self, key: &QueryKey) -> Result<CacheEntry> {
        if let Some(entry) = self.inner.cache.get(key) {
            if entry.status == EntryStatus::Stale {
                self.refresh_in_background(key);
            }
            return Ok(entry);
        }

        let this = self.clone();
        let owned = key.clone();
        self.inner
            .cache
            .get_or_fetch(key, move || async move { this.scrape(&owned).await }.boxed())
            .await
    }

    /// Drop any cached entry for `key` and look it up again.
    pub async fn refetch(&self, key: &QueryKey) -> Result<CacheEntry> {
        self.inner.cache.invalidate(key);
        self.lookup(key).await
    }

    fn refresh_in_background(&self, key: &QueryKey) {
        let this = self.clone();
        let owned = key.clone();
        let started = self
            .inner
            .cache
            .refresh(key, move || async move { this.scrape(&owned).await }.boxed());
        if started {
            tracing::debug!(key = %key, "refreshing stale entry");
        }
    }

    /// Fetch and parse the search page for `key`, bypassing the cache.
    async fn scrape(&self, key: &QueryKey) -> Result<CacheEntry> {
        let url = self.inner.template.for_query(key)?;
        let mut refetched = false;

        loop {
            let body = match self.inner.source.fetch(&url).await {
                Ok(body) => body,
                Err(FetchError::NotFound) => return Ok(CacheEntry::negative()),
                Err(e) => return Err(e.into()),
            };

            match self.inner.extractor.parse(&body, &url) {
                Ok(records) => {
                    tracing::info!(key = %key, records = records.len(), "lookup complete");
                    return Ok(CacheEntry::found(records));
                }
                Err(ParseError::NoMatch) => return Ok(CacheEntry::negative()),
                Err(ParseError::StructureChanged) if !refetched => {
                    tracing::warn!(
                        key = %key,
                        source = self.inner.source.name(),
                        "page structure not recognized, fetching once more"
                    );
                    refetched = true;
                }
                Err(e) => {
                    tracing::error!(key = %key, url = %url, "page structure not recognized");
                    return Err(e.into());
                }
            }
        }
    }
}
