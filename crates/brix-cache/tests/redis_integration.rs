//! Integration tests against a real Redis.
//!
//! Tests use testcontainers to spin up a Redis instance and are ignored by
//! default since they need Docker: `cargo test -- --ignored`.

use std::time::Duration;

use brix_cache::{
    CacheConfig, CacheStore, GetOptions, RateLimitConfig, RateLimitOptions, RateLimiter,
    RedisConfig, SetOptions, create_store,
};
use brix_store::{DynKvStore, SystemClock, Transaction};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use uuid::Uuid;

// Shared Redis container for all tests. Conditional PEXPIRE needs Redis 7.
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .with_tag("7.2")
                .start()
                .await
                .expect("start redis container");
            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            (container, format!("redis://127.0.0.1:{host_port}"))
        })
        .await;
    url.clone()
}

async fn redis_store() -> DynKvStore {
    let config = RedisConfig {
        enabled: true,
        url: get_redis_url().await,
        ..RedisConfig::default()
    };
    create_store(&config, SystemClock::shared()).await
}

/// Each test gets its own namespace so they can share the container.
fn namespace() -> String {
    format!("test-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_connects_to_redis() {
    let store = redis_store().await;
    assert_eq!(store.backend_name(), "redis");
    store.ping().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unreachable_redis_falls_back_to_memory() {
    let config = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        timeout_ms: 200,
        ..RedisConfig::default()
    };
    let store = create_store(&config, SystemClock::shared()).await;
    assert_eq!(store.backend_name(), "memory");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_cache_round_trip_and_tags() {
    let store = redis_store().await;
    let cache = CacheStore::new(store, SystemClock::shared(), CacheConfig::default())
        .with_namespace(namespace());

    assert!(cache.set("a", "A", &SetOptions::new().tag("t1")).await);
    assert!(cache.set("b", "B", &SetOptions::new().tag("t2")).await);
    assert!(
        cache
            .set("c", &serde_json::json!({"c": true}), &SetOptions::new().tags(["t1", "t2"]))
            .await
    );

    assert_eq!(
        cache.get::<String>("a", &GetOptions::new()).await.as_deref(),
        Some("A")
    );
    assert_eq!(cache.invalidate_tags(&["t1"]).await, 2);
    assert_eq!(cache.get::<String>("a", &GetOptions::new()).await, None);
    assert_eq!(
        cache.get::<String>("b", &GetOptions::new()).await.as_deref(),
        Some("B")
    );

    assert!(cache.delete("b").await);
    assert!(!cache.delete("b").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_entry_expires_in_store() {
    let store = redis_store().await;
    let config = CacheConfig {
        stale_retention_secs: 0,
        ..CacheConfig::default()
    };
    let cache =
        CacheStore::new(store.clone(), SystemClock::shared(), config).with_namespace(namespace());

    cache
        .set("k", "v", &SetOptions::new().ttl(Duration::from_millis(200)))
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(cache.get::<String>("k", &GetOptions::new()).await, None);
    let key = cache.namespace().cache_key("k");
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clear_and_stats() {
    let store = redis_store().await;
    let config = CacheConfig {
        clear_batch_size: 7,
        scan_count: 5,
        ..CacheConfig::default()
    };
    let cache = CacheStore::new(store, SystemClock::shared(), config).with_namespace(namespace());

    for i in 0..25 {
        cache
            .set(&format!("k{i}"), &i, &SetOptions::new().tag(format!("t{}", i % 4)))
            .await;
    }

    let stats = cache.stats().await.expect("stats");
    assert_eq!(stats.backend, "redis");
    assert_eq!(stats.keys.total, 25);
    assert_eq!(stats.tags.total_tags, 4);
    assert_eq!(stats.tags.total_tagged_keys, 25);
    assert!(stats.memory.used_bytes.is_some());

    assert!(cache.clear().await);
    let stats = cache.stats().await.expect("stats");
    assert_eq!(stats.keys.total, 0);
    assert_eq!(stats.tags.total_tags, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rate_limit_against_redis() {
    let store = redis_store().await;
    let limiter = RateLimiter::new(store, SystemClock::shared(), RateLimitConfig::default())
        .with_namespace(namespace());
    let opts = RateLimitOptions::new(60_000, 3);

    for expected in [2, 1, 0] {
        let result = limiter.check("client", &opts).await;
        assert!(result.success);
        assert_eq!(result.remaining, expected);
    }
    let rejected = limiter.check("client", &opts).await;
    assert!(!rejected.success);
    assert!(rejected.retry_after.unwrap() >= 1);

    assert!(!limiter.get("client", &opts).await.success);
    assert!(limiter.reset("client", &opts).await);
    assert_eq!(limiter.check("client", &opts).await.remaining, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_transaction_replies_line_up() {
    let store = redis_store().await;
    let key = format!("{}:tx", namespace());

    let mut tx = Transaction::new();
    tx.set_px(&key, b"v".to_vec(), 10_000)
        .pexpire(&key, 20_000)
        .del(vec![key.clone()]);
    let replies = store.exec(tx).await.unwrap();

    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0], brix_store::Reply::Ok);
    assert_eq!(replies[1].as_int(), Some(1));
    assert_eq!(replies[2].as_int(), Some(1));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_tag_expiry_only_grows() {
    let store = redis_store().await;
    let cache = CacheStore::new(store.clone(), SystemClock::shared(), CacheConfig::default())
        .with_namespace(namespace());

    cache
        .set("long", "L", &SetOptions::new().ttl(Duration::from_secs(3600)).tag("t"))
        .await;
    cache
        .set("short", "S", &SetOptions::new().ttl(Duration::from_secs(1)).tag("t"))
        .await;

    let tag_key = cache.namespace().tag_key("t");
    match store.pttl(&tag_key).await.unwrap() {
        brix_store::Ttl::Remaining(ms) => assert!(ms > (3600 + 86_400 - 5) * 1000),
        other => panic!("unexpected tag ttl {other:?}"),
    }

    cache
        .set("long", "L2", &SetOptions::new().tag("other"))
        .await;
    assert_eq!(cache.invalidate_tags(&["t"]).await, 1);
    assert_eq!(
        cache.get::<String>("long", &GetOptions::new()).await.as_deref(),
        Some("L2")
    );
}
