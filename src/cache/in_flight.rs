//! Per-key fetch coalescing.
//!
//! Each pending fetch runs as a spawned task wrapped in a
//! [`Shared`] future. Concurrent callers for the same key clone the shared
//! handle instead of starting their own fetch. The task removes its marker
//! when it finishes, after the cache has been written, so a late caller
//! either finds the marker or finds the cached entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use super::CacheEntry;
use crate::telemetry;
use crate::types::QueryKey;
use crate::{CinescrapeError, Result};

/// Handle to a fetch that may be awaited by any number of callers.
pub type SharedFetch = Shared<BoxFuture<'static, Result<CacheEntry>>>;

/// Outcome of [`InFlightRegistry::join_or_start()`].
pub enum Flight {
    /// The entry was already cached when checked under the registry lock.
    Cached(CacheEntry),
    /// Another caller's fetch was already pending.
    Joined(SharedFetch),
    /// This caller started a new fetch.
    Started(SharedFetch),
}

type Pending = Arc<Mutex<HashMap<QueryKey, SharedFetch>>>;

/// Registry of fetches currently in progress, keyed by query.
#[derive(Default)]
pub struct InFlightRegistry {
    pending: Pending,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fetches currently in progress.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a fetch for `key` is in progress.
    pub fn is_pending(&self, key: &QueryKey) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, SharedFetch>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the pending fetch for `key`, or start one.
    ///
    /// Under the registry lock: an existing fetch is joined; otherwise
    /// `recheck` gets a chance to answer from the cache; otherwise `start`
    /// builds the fetch, which is spawned and registered. Must be called
    /// from within a tokio runtime.
    pub fn join_or_start(
        &self,
        key: &QueryKey,
        recheck: impl FnOnce() -> Option<CacheEntry>,
        start: impl FnOnce() -> BoxFuture<'static, Result<CacheEntry>>,
    ) -> Flight {
        let mut pending = self.lock();

        if let Some(shared) = pending.get(key) {
            metrics::counter!(telemetry::COALESCED_LOOKUPS_TOTAL).increment(1);
            tracing::debug!(key = %key, "joining in-flight fetch");
            return Flight::Joined(shared.clone());
        }

        // a fetch may have completed between the caller's miss and this lock
        if let Some(entry) = recheck() {
            return Flight::Cached(entry);
        }

        let fetch = start();
        let registry = Arc::clone(&self.pending);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            if let Err(e) = &result {
                tracing::warn!(key = %task_key, error = %e, "fetch failed");
            }
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&task_key);
            result
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(CinescrapeError::TaskFailed(e.to_string())),
            }
        }
        .boxed()
        .shared();

        pending.insert(key.clone(), shared.clone());
        Flight::Started(shared)
    }
}
