//! Tests for [`ResultCache`]: storage, freshness, eviction, and coalescing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use futures_util::FutureExt;
use tokio::sync::Semaphore;

use cinescrape::cache::SnapshotEntry;
use cinescrape::{
    CacheConfig, CacheEntry, CinescrapeError, EntryStatus, FetchError, MovieRecord, ResultCache,
    normalize,
};

fn record(title: &str) -> MovieRecord {
    MovieRecord::new(title, format!("https://movies.example/t/{title}")).unwrap()
}

fn aged(mut entry: CacheEntry, age: Duration) -> CacheEntry {
    entry.fetched_at = SystemTime::now() - age;
    entry
}

const HOUR: Duration = Duration::from_secs(3600);

/// A positive entry half an hour into its stale grace window.
fn stale_heat() -> CacheEntry {
    aged(CacheEntry::found(vec![record("Heat")]), 24 * HOUR + HOUR / 2)
}

// =========================================================================
// Storage
// =========================================================================

#[test]
fn cache_config_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.max_entries, 1000);
    assert_eq!(config.fresh_ttl, 24 * HOUR);
    assert_eq!(config.stale_grace, HOUR);
    assert_eq!(config.negative_ttl, HOUR);
}

#[test]
fn cache_miss_returns_none() {
    let cache = ResultCache::new(&CacheConfig::default());
    assert!(cache.get(&normalize("nonexistent")).is_none());
}

#[test]
fn put_then_get() {
    let cache = ResultCache::new(&CacheConfig::default());
    cache.put(normalize("heat"), CacheEntry::found(vec![record("Heat")]));

    let got = cache.get(&normalize("  HEAT ")).unwrap();
    assert_eq!(got.status, EntryStatus::Fresh);
    assert_eq!(got.records[0].title, "Heat");
}

#[test]
fn put_overwrites() {
    let cache = ResultCache::new(&CacheConfig::default());
    let key = normalize("heat");
    cache.put(key.clone(), CacheEntry::negative());
    cache.put(key.clone(), CacheEntry::found(vec![record("Heat")]));

    let got = cache.get(&key).unwrap();
    assert_eq!(got.status, EntryStatus::Fresh);
    assert_eq!(got.records.len(), 1);
}

#[test]
fn invalidate_and_clear() {
    let cache = ResultCache::new(&CacheConfig::default());
    cache.put(normalize("alpha"), CacheEntry::negative());
    cache.put(normalize("beta"), CacheEntry::negative());

    cache.invalidate(&normalize("alpha"));
    assert!(cache.get(&normalize("alpha")).is_none());
    assert!(cache.get(&normalize("beta")).is_some());

    cache.clear();
    cache.run_pending_tasks();
    assert!(cache.get(&normalize("beta")).is_none());
    assert!(cache.is_empty());
}

#[test]
fn negative_entries_carry_no_records() {
    let cache = ResultCache::new(&CacheConfig::default());
    cache.put(normalize("zzyzx"), CacheEntry::found(vec![]));

    let got = cache.get(&normalize("zzyzx")).unwrap();
    assert_eq!(got.status, EntryStatus::Negative);
    assert!(got.records.is_empty());
}

// =========================================================================
// Freshness
// =========================================================================

#[test]
fn fresh_becomes_stale_after_ttl() {
    let cache = ResultCache::new(&CacheConfig::default());
    let key = normalize("heat");
    cache.put(key.clone(), stale_heat());

    let got = cache.get(&key).unwrap();
    assert_eq!(got.status, EntryStatus::Stale);
    assert_eq!(got.records.len(), 1);
}

#[test]
fn stale_entry_gone_after_grace() {
    let cache = ResultCache::new(&CacheConfig::default());
    let key = normalize("heat");
    let expired = aged(CacheEntry::found(vec![record("Heat")]), 25 * HOUR + HOUR / 2);
    cache.put(key.clone(), expired);
    assert!(cache.get(&key).is_none());
}

#[test]
fn negative_entry_expires_at_negative_ttl() {
    let cache = ResultCache::new(&CacheConfig::default());
    cache.put(normalize("young"), aged(CacheEntry::negative(), HOUR / 2));
    cache.put(normalize("old"), aged(CacheEntry::negative(), HOUR * 2));

    let young = cache.get(&normalize("young")).unwrap();
    assert_eq!(young.status, EntryStatus::Negative);
    assert!(cache.get(&normalize("old")).is_none());
}

#[test]
fn ttl_expiry_in_real_time() {
    let config = CacheConfig::new()
        .fresh_ttl(Duration::from_millis(100))
        .stale_grace(Duration::from_millis(200));
    let cache = ResultCache::new(&config);
    let key = normalize("heat");
    cache.put(key.clone(), CacheEntry::found(vec![record("Heat")]));

    assert_eq!(cache.get(&key).unwrap().status, EntryStatus::Fresh);

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.get(&key).unwrap().status, EntryStatus::Stale);

    std::thread::sleep(Duration::from_millis(200));
    assert!(cache.get(&key).is_none());
}

// =========================================================================
// Eviction
// =========================================================================

#[test]
fn least_recently_used_entry_is_evicted() {
    let cache = ResultCache::new(&CacheConfig::new().max_entries(2));

    cache.put(normalize("alpha"), CacheEntry::negative());
    cache.run_pending_tasks();
    cache.put(normalize("beta"), CacheEntry::negative());
    cache.run_pending_tasks();

    // touch alpha so beta becomes the least recently used
    assert!(cache.get(&normalize("alpha")).is_some());
    cache.run_pending_tasks();

    cache.put(normalize("gamma"), CacheEntry::negative());
    cache.run_pending_tasks();

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&normalize("alpha")).is_some());
    assert!(cache.get(&normalize("beta")).is_none());
    assert!(cache.get(&normalize("gamma")).is_some());
}

#[test]
fn capacity_is_never_exceeded() {
    let cache = ResultCache::new(&CacheConfig::new().max_entries(10));
    for i in 0..50 {
        cache.put(normalize(&format!("movie {i}")), CacheEntry::negative());
        cache.run_pending_tasks();
    }
    assert!(cache.len() <= 10);
}

// =========================================================================
// Coalescing
// =========================================================================

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let cache = Arc::new(ResultCache::new(&CacheConfig::default()));
    let calls = Arc::new(AtomicU32::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch(&normalize("heat"), move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _permit = gate.acquire().await.unwrap();
                        Ok(CacheEntry::found(vec![record("Heat")]))
                    }
                    .boxed()
                })
                .await
        }));
    }

    tokio::task::yield_now().await;
    gate.add_permits(1);

    for handle in handles {
        let entry = handle.await.unwrap().unwrap();
        assert_eq!(entry.records[0].title, "Heat");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.in_flight().is_empty());
    assert!(cache.get(&normalize("heat")).is_some());
}

#[tokio::test]
async fn cached_entry_skips_fetch() {
    let cache = ResultCache::new(&CacheConfig::default());
    cache.put(normalize("heat"), CacheEntry::negative());

    let entry = cache
        .get_or_fetch(&normalize("heat"), || async { unreachable!() }.boxed())
        .await
        .unwrap();
    assert!(entry.is_negative());
}

#[tokio::test]
async fn failed_fetch_writes_nothing() {
    let cache = ResultCache::new(&CacheConfig::default());
    let key = normalize("heat");

    let err = cache
        .get_or_fetch(&key, || {
            async { Err(CinescrapeError::from(FetchError::ServerError { status: 503 })) }.boxed()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CinescrapeError::Fetch(FetchError::ServerError { status: 503 })
    ));
    assert!(cache.get(&key).is_none());
    assert!(!cache.in_flight().is_pending(&key));

    // the next caller fetches again
    let entry = cache
        .get_or_fetch(&key, || async { Ok(CacheEntry::negative()) }.boxed())
        .await
        .unwrap();
    assert!(entry.is_negative());
}

#[tokio::test]
async fn fetch_completes_when_caller_gives_up() {
    let cache = Arc::new(ResultCache::new(&CacheConfig::default()));
    let gate = Arc::new(Semaphore::new(0));
    let key = normalize("heat");

    let waiter = {
        let cache = Arc::clone(&cache);
        let gate = Arc::clone(&gate);
        let key = key.clone();
        tokio::spawn(async move {
            cache
                .get_or_fetch(&key, move || {
                    async move {
                        let _permit = gate.acquire().await.unwrap();
                        Ok(CacheEntry::found(vec![record("Heat")]))
                    }
                    .boxed()
                })
                .await
        })
    };
    while !cache.in_flight().is_pending(&key) {
        tokio::task::yield_now().await;
    }
    waiter.abort();
    gate.add_permits(1);

    while cache.in_flight().is_pending(&key) {
        tokio::task::yield_now().await;
    }
    assert_eq!(cache.get(&key).unwrap().status, EntryStatus::Fresh);
}

// =========================================================================
// Background refresh
// =========================================================================

async fn settle(cache: &ResultCache) {
    while !cache.in_flight().is_empty() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn refresh_replaces_stale_entry() {
    let cache = ResultCache::new(&CacheConfig::default());
    let key = normalize("heat");
    cache.put(key.clone(), stale_heat());

    let started = cache.refresh(&key, || {
        async { Ok(CacheEntry::found(vec![record("Heat"), record("The Heat")])) }.boxed()
    });
    assert!(started);
    settle(&cache).await;

    let got = cache.get(&key).unwrap();
    assert_eq!(got.status, EntryStatus::Fresh);
    assert_eq!(got.records.len(), 2);
}

#[tokio::test]
async fn failed_refresh_keeps_stale_entry() {
    let cache = ResultCache::new(&CacheConfig::default());
    let key = normalize("heat");
    cache.put(key.clone(), stale_heat());

    cache.refresh(&key, || async { Err(CinescrapeError::from(FetchError::Timeout)) }.boxed());
    settle(&cache).await;

    let got = cache.get(&key).unwrap();
    assert_eq!(got.status, EntryStatus::Stale);
    assert_eq!(got.records[0].title, "Heat");
}

#[tokio::test]
async fn refresh_joins_pending_fetch() {
    let cache = ResultCache::new(&CacheConfig::default());
    let gate = Arc::new(Semaphore::new(0));
    let key = normalize("heat");

    let first = {
        let gate = Arc::clone(&gate);
        cache.refresh(&key, move || {
            async move {
                let _permit = gate.acquire().await.unwrap();
                Ok(CacheEntry::negative())
            }
            .boxed()
        })
    };
    let second = cache.refresh(&key, || async { unreachable!() }.boxed());
    assert!(first);
    assert!(!second);

    gate.add_permits(1);
    settle(&cache).await;
    assert!(cache.get(&key).unwrap().is_negative());
}

// =========================================================================
// Snapshot / restore
// =========================================================================

#[test]
fn snapshot_exports_live_entries_in_key_order() {
    let cache = ResultCache::new(&CacheConfig::default());
    cache.put(normalize("beta"), CacheEntry::negative());
    cache.put(normalize("alpha"), CacheEntry::found(vec![record("Alpha")]));
    cache.run_pending_tasks();

    let keys: Vec<String> = cache
        .snapshot()
        .into_iter()
        .map(|e| e.key.as_str().to_string())
        .collect();
    assert_eq!(keys, ["alpha", "beta"]);
}

#[test]
fn restore_skips_expired_and_keeps_age() {
    let cache = ResultCache::new(&CacheConfig::default());
    let entries = vec![
        SnapshotEntry {
            key: normalize("stale"),
            entry: stale_heat(),
        },
        SnapshotEntry {
            key: normalize("expired"),
            entry: aged(CacheEntry::negative(), 3 * HOUR),
        },
        SnapshotEntry {
            key: normalize("fresh"),
            entry: CacheEntry::found(vec![record("Alien")]),
        },
    ];

    assert_eq!(cache.restore(entries), 2);
    assert_eq!(cache.get(&normalize("stale")).unwrap().status, EntryStatus::Stale);
    assert_eq!(cache.get(&normalize("fresh")).unwrap().status, EntryStatus::Fresh);
    assert!(cache.get(&normalize("expired")).is_none());
}
