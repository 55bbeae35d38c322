//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus, statsd);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `cinescrape_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `outcome`: fetch result: "ok", "not_found", "blocked", "server_error",
//!   "rate_limited", "timeout", "connection"
//! - `status`: cache entry status: "fresh", "stale", "negative"
//! - `kind`: parse failure kind: "structure_changed", "no_match"

/// Total HTTP requests sent upstream (one per attempt).
///
/// Labels: `outcome`.
pub const FETCHES_TOTAL: &str = "cinescrape_fetches_total";

/// Upstream request duration in seconds.
pub const FETCH_DURATION_SECONDS: &str = "cinescrape_fetch_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `source`.
pub const RETRIES_TOTAL: &str = "cinescrape_retries_total";

/// Total cache hits.
///
/// Labels: `status`.
pub const CACHE_HITS_TOTAL: &str = "cinescrape_cache_hits_total";

/// Total cache misses.
pub const CACHE_MISSES_TOTAL: &str = "cinescrape_cache_misses_total";

/// Lookups that joined an already in-flight fetch instead of starting one.
pub const COALESCED_LOOKUPS_TOTAL: &str = "cinescrape_coalesced_lookups_total";

/// Total parse failures.
///
/// Labels: `kind`.
pub const PARSE_FAILURES_TOTAL: &str = "cinescrape_parse_failures_total";

/// Replies dropped because their session moved on or timed out.
pub const DISCARDED_REPLIES_TOTAL: &str = "cinescrape_discarded_replies_total";
