//! Metrics for the cache and the rate limiter.
//!
//! Recorded through the `metrics` facade; the host process decides which
//! recorder (Prometheus, statsd, none) receives them.
//!
//! Degraded outcomes get their own label values so operators can see a store
//! outage even though callers are shielded from it:
//! - cache writes that reported success without storing (`outcome="degraded"`)
//! - rate-limit checks that allowed traffic because the store failed
//!   (`decision="fail_open"`)

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "brix_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "brix_cache_misses_total";
    pub const CACHE_WRITES_TOTAL: &str = "brix_cache_writes_total";
    pub const CACHE_INVALIDATED_TOTAL: &str = "brix_cache_invalidated_entries_total";
    pub const CACHE_REFRESHES_TOTAL: &str = "brix_cache_refreshes_total";
    pub const RATELIMIT_DECISIONS_TOTAL: &str = "brix_ratelimit_decisions_total";
    pub const STORE_ERRORS_TOTAL: &str = "brix_store_errors_total";
}

/// Record a cache hit; `freshness` is `"fresh"` or `"stale"`.
pub fn record_cache_hit(freshness: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "freshness" => freshness).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a cache write; `outcome` is `"stored"`, `"skipped"` or `"degraded"`.
pub fn record_cache_write(outcome: &'static str) {
    counter!(names::CACHE_WRITES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_invalidated(entries: u64) {
    counter!(names::CACHE_INVALIDATED_TOTAL).increment(entries);
}

/// Record a background refresh; `outcome` is `"spawned"` or `"coalesced"`.
pub fn record_refresh(outcome: &'static str) {
    counter!(names::CACHE_REFRESHES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a rate-limit decision: `"allowed"`, `"rejected"` or `"fail_open"`.
pub fn record_rate_limit(decision: &'static str) {
    counter!(names::RATELIMIT_DECISIONS_TOTAL, "decision" => decision).increment(1);
}

/// Record a store failure seen at a public operation boundary.
pub fn record_store_error(operation: &'static str, category: brix_store::ErrorCategory) {
    counter!(
        names::STORE_ERRORS_TOTAL,
        "operation" => operation,
        "category" => category.to_string()
    )
    .increment(1);
}
