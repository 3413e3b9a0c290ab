//! Degraded-store behaviour: the cache fails soft, the limiter fails open, and
//! every failing call logs exactly one warning.

mod common;

use std::sync::Arc;
use std::time::Duration;

use brix_cache::{
    AdminSnapshot, CacheConfig, CacheStore, GetOptions, RateLimitConfig, RateLimitOptions,
    RateLimiter, SetOptions,
};
use brix_store::{DynKvStore, ManualClock, TimeoutStore};
use common::{CapturedLogs, FailingStore, HangingStore, START_MS};

fn failing() -> (CacheStore, RateLimiter, Arc<FailingStore>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let backend = Arc::new(FailingStore::default());
    let store: DynKvStore = backend.clone();
    (
        CacheStore::new(store.clone(), clock.clone(), CacheConfig::default()),
        RateLimiter::new(store, clock, RateLimitConfig::default()),
        backend,
    )
}

#[tokio::test]
async fn test_rate_limit_fails_open() {
    let (logs, _guard) = CapturedLogs::install();
    let (_cache, limiter, _backend) = failing();
    let opts = RateLimitOptions::new(60_000, 5);

    let result = limiter.check("10.0.0.1", &opts).await;
    assert!(result.success);
    assert_eq!(result.remaining, 5);
    assert_eq!(result.retry_after, None);
    assert_eq!(logs.warnings(), 1);

    logs.clear();
    let peek = limiter.get("10.0.0.1", &opts).await;
    assert!(peek.success);
    assert_eq!(peek.remaining, 5);
    assert_eq!(logs.warnings(), 1);

    logs.clear();
    assert!(!limiter.reset("10.0.0.1", &opts).await);
    assert_eq!(logs.warnings(), 1);
}

#[tokio::test]
async fn test_cache_reads_miss() {
    let (logs, _guard) = CapturedLogs::install();
    let (cache, _limiter, backend) = failing();

    let value: Option<String> = cache.get("k", &GetOptions::new()).await;
    assert_eq!(value, None);
    assert_eq!(backend.calls(), 1);
    assert_eq!(logs.warnings(), 1);
    assert!(logs.contents().contains("connection refused"));
}

#[tokio::test]
async fn test_cache_writes_pretend_success() {
    let (logs, _guard) = CapturedLogs::install();
    let (cache, _limiter, _backend) = failing();

    assert!(cache.set("k", "v", &SetOptions::new().tag("t")).await);
    assert_eq!(logs.warnings(), 1);
}

#[tokio::test]
async fn test_cache_removals_report_nothing_removed() {
    let (logs, _guard) = CapturedLogs::install();
    let (cache, _limiter, _backend) = failing();

    assert!(!cache.delete("k").await);
    assert_eq!(logs.warnings(), 1);

    logs.clear();
    assert_eq!(cache.invalidate_tags(&["a", "b", "c"]).await, 0);
    assert_eq!(logs.warnings(), 1);

    logs.clear();
    assert!(!cache.clear().await);
    assert_eq!(logs.warnings(), 1);

    logs.clear();
    assert!(cache.stats().await.is_none());
    assert_eq!(logs.warnings(), 1);
}

#[tokio::test]
async fn test_no_cache_skips_the_store() {
    let (cache, _limiter, backend) = failing();

    let value: Option<String> = cache.get("k", &GetOptions::new().no_cache()).await;
    assert_eq!(value, None);
    assert!(cache.set("k", "v", &SetOptions::new().no_store()).await);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_admin_snapshot_survives_outage() {
    let (cache, limiter, _backend) = failing();

    let snapshot = AdminSnapshot::collect(&cache, &limiter).await;
    assert!(snapshot.cache.is_none());
    assert!(snapshot.rate_limit.is_none());
    assert_eq!(snapshot.namespace, "brix");
}

#[tokio::test]
async fn test_slow_store_is_treated_as_failure() {
    let (logs, _guard) = CapturedLogs::install();
    let clock = Arc::new(ManualClock::new(START_MS));
    let store: DynKvStore = Arc::new(TimeoutStore::new(HangingStore, Duration::from_millis(20)));
    let cache = CacheStore::new(store.clone(), clock.clone(), CacheConfig::default());
    let limiter = RateLimiter::new(store, clock, RateLimitConfig::default());

    assert_eq!(cache.get::<String>("k", &GetOptions::new()).await, None);
    assert!(cache.set("k", "v", &SetOptions::new()).await);
    assert!(limiter.check("u", &limiter.default_options()).await.success);

    assert_eq!(logs.warnings(), 3);
    assert!(logs.contents().contains("Timed out"));
}
