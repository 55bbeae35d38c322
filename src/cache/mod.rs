//! Result cache for movie lookups.
//!
//! [`ResultCache`] maps a [`QueryKey`] to a [`CacheEntry`]: the records a
//! search produced (or a confirmed "no results" outcome) plus when they
//! were fetched.
//!
//! # Lifecycle
//!
//! ```text
//!  put ──► Fresh ──(fresh_ttl)──► Stale ──(stale_grace)──► evicted
//!  put ──► Negative ─────────(negative_ttl)──────────────► evicted
//! ```
//!
//! Status is recomputed from `fetched_at` on every read, so an entry that
//! was stored as `Fresh` comes back `Stale` once its TTL has passed. Stale
//! entries are still served; the lookup pipeline refreshes them in the
//! background. Capacity is bounded with least-recently-used eviction.
//!
//! # Concurrency
//!
//! Backed by `moka::sync::Cache`, which handles concurrent access
//! internally. Fetches go through [`InFlightRegistry`], which guarantees at
//! most one concurrent fetch per key: see [`ResultCache::get_or_fetch()`].

pub mod in_flight;
pub mod snapshot;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use futures_util::future::BoxFuture;
use moka::Expiry;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::telemetry;
use crate::types::{MovieRecord, QueryKey};
use crate::Result;

pub use in_flight::{Flight, InFlightRegistry};
pub use snapshot::{JsonFileStore, SnapshotEntry, SnapshotStore};

/// Configuration for the result cache.
///
/// ```rust
/// # use cinescrape::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .fresh_ttl(Duration::from_secs(12 * 3600))
///     .negative_ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached queries. Default: 1,000.
    pub max_entries: u64,
    /// How long a positive entry stays `Fresh`. Default: 24 hours.
    pub fresh_ttl: Duration,
    /// How long a positive entry stays servable as `Stale` after
    /// `fresh_ttl`. Default: 1 hour.
    pub stale_grace: Duration,
    /// Lifetime of a negative ("no results") entry. Default: 1 hour.
    pub negative_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            fresh_ttl: Duration::from_secs(24 * 3600),
            stale_grace: Duration::from_secs(3600),
            negative_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    pub fn fresh_ttl(mut self, ttl: Duration) -> Self {
        self.fresh_ttl = ttl;
        self
    }

    pub fn stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    pub fn negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    /// Total time an entry may stay in the cache.
    pub fn lifetime(&self, entry: &CacheEntry) -> Duration {
        if entry.is_negative() {
            self.negative_ttl
        } else {
            self.fresh_ttl.saturating_add(self.stale_grace)
        }
    }
}

/// Freshness of a cached outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Fresh,
    /// Past its TTL: still served, but due for a background refresh.
    Stale,
    /// A confirmed "no results" outcome.
    Negative,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Fresh => "fresh",
            EntryStatus::Stale => "stale",
            EntryStatus::Negative => "negative",
        }
    }
}

/// Cached outcome of one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Records in page order. Always empty for negative entries.
    pub records: Vec<MovieRecord>,
    pub fetched_at: SystemTime,
    pub status: EntryStatus,
}

impl CacheEntry {
    /// Entry for a successful parse. An empty list is a negative outcome.
    pub fn found(records: Vec<MovieRecord>) -> Self {
        if records.is_empty() {
            return Self::negative();
        }
        Self {
            records,
            fetched_at: SystemTime::now(),
            status: EntryStatus::Fresh,
        }
    }

    /// Entry for a confirmed "no results" outcome.
    pub fn negative() -> Self {
        Self {
            records: Vec::new(),
            fetched_at: SystemTime::now(),
            status: EntryStatus::Negative,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.status == EntryStatus::Negative
    }

    /// Time since the entry was fetched (zero if the clock went backwards).
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.fetched_at)
            .unwrap_or_default()
    }
}

/// Per-entry expiry: lifetime measured from `fetched_at`, not from the
/// moment of insertion, so restored snapshots keep their age.
struct EntryExpiry {
    config: CacheConfig,
}

impl EntryExpiry {
    fn remaining(&self, entry: &CacheEntry) -> Duration {
        self.config.lifetime(entry).saturating_sub(entry.age())
    }
}

impl Expiry<QueryKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &QueryKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.remaining(value))
    }

    fn expire_after_update(
        &self,
        _key: &QueryKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.remaining(value))
    }
}

/// In-memory, capacity-bounded LRU cache of lookup outcomes.
pub struct ResultCache {
    entries: Cache<QueryKey, CacheEntry>,
    config: CacheConfig,
    in_flight: Arc<InFlightRegistry>,
}

impl ResultCache {
    /// Create a cache with its own in-flight registry.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_in_flight(config, Arc::new(InFlightRegistry::new()))
    }

    /// Create a cache that coalesces fetches through `in_flight`.
    pub fn with_in_flight(config: &CacheConfig, in_flight: Arc<InFlightRegistry>) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry {
                config: config.clone(),
            })
            .build();
        Self {
            entries,
            config: config.clone(),
            in_flight,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Look up an entry, with its status recomputed for the current time.
    ///
    /// Returns `None` on miss or once the entry has outlived its lifetime.
    /// Emits cache hit/miss metrics.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        match self.peek(key) {
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "status" => entry.status.as_str())
                    .increment(1);
                tracing::debug!(key = %key, status = entry.status.as_str(), "cache hit");
                Some(entry)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                tracing::debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// [`get()`](Self::get) without metrics or logging.
    fn peek(&self, key: &QueryKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?;
        self.with_current_status(entry)
    }

    fn with_current_status(&self, mut entry: CacheEntry) -> Option<CacheEntry> {
        let age = entry.age();
        if age >= self.config.lifetime(&entry) {
            return None;
        }
        if !entry.is_negative() {
            entry.status = if age < self.config.fresh_ttl {
                EntryStatus::Fresh
            } else {
                EntryStatus::Stale
            };
        }
        Some(entry)
    }

    /// Insert or overwrite the entry for `key`.
    pub fn put(&self, key: QueryKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Evict the entry for `key`, if any.
    pub fn invalidate(&self, key: &QueryKey) {
        self.entries.invalidate(key);
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Number of entries currently in the cache.
    ///
    /// Eventually consistent; call [`run_pending_tasks()`](Self::run_pending_tasks)
    /// first for an exact count.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions and bookkeeping.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    /// Return the cached entry for `key`, or run `work` to produce one.
    ///
    /// At most one `work` runs per key at a time: concurrent callers for the
    /// same missing key all await the first caller's fetch. The fetch runs
    /// as its own task, so it completes (and populates the cache) even if
    /// every caller stops waiting. Errors are shared with all waiters and
    /// nothing is written.
    pub async fn get_or_fetch<F>(&self, key: &QueryKey, work: F) -> Result<CacheEntry>
    where
        F: FnOnce() -> BoxFuture<'static, Result<CacheEntry>>,
    {
        let flight = self.in_flight.join_or_start(
            key,
            || self.peek(key),
            || self.store_after(key, work),
        );
        match flight {
            Flight::Cached(entry) => Ok(entry),
            Flight::Joined(shared) | Flight::Started(shared) => shared.await,
        }
    }

    /// Refresh `key` in the background.
    ///
    /// Does nothing if a fetch for `key` is already in flight. Returns
    /// whether a new fetch was started. On failure the existing entry is
    /// left in place.
    pub fn refresh<F>(&self, key: &QueryKey, work: F) -> bool
    where
        F: FnOnce() -> BoxFuture<'static, Result<CacheEntry>>,
    {
        let flight = self
            .in_flight
            .join_or_start(key, || None, || self.store_after(key, work));
        matches!(flight, Flight::Started(_))
    }

    /// Wrap `work` so that its successful outcome is written to the cache.
    fn store_after<F>(&self, key: &QueryKey, work: F) -> BoxFuture<'static, Result<CacheEntry>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<CacheEntry>>,
    {
        let entries = self.entries.clone();
        let key = key.clone();
        let fut = work();
        Box::pin(async move {
            let entry = fut.await?;
            entries.insert(key, entry.clone());
            Ok(entry)
        })
    }

    /// Export all live entries, ordered by key.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<SnapshotEntry> = self
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                self.with_current_status(entry).map(|entry| SnapshotEntry {
                    key: (*key).clone(),
                    entry,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Import entries, skipping any that have outlived their lifetime.
    ///
    /// Returns the number of entries restored.
    pub fn restore(&self, entries: Vec<SnapshotEntry>) -> usize {
        let mut restored = 0;
        for SnapshotEntry { key, entry } in entries {
            if entry.age() < self.config.lifetime(&entry) {
                self.put(key, entry);
                restored += 1;
            }
        }
        restored
    }
}
