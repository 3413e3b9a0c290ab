//! # brix-cache
//!
//! Shared caching and rate limiting for horizontally scaled services.
//!
//! Every instance points at the same key-value store (normally Redis), so a
//! value cached or a request counted by one instance is visible to all of
//! them. Store outages degrade gracefully: cache reads miss, cache writes are
//! dropped and rate-limit checks fail open.
//!
//! ```ignore
//! use brix_cache::{CacheStore, GetOptions, RateLimiter, SetOptions, create_store, load_config};
//! use brix_store::SystemClock;
//!
//! let config = load_config(None)?;
//! let clock = SystemClock::shared();
//! let store = create_store(&config.redis, clock.clone()).await;
//!
//! let cache = CacheStore::from_config(store.clone(), clock.clone(), &config);
//! cache.set("fixtures:today", &fixtures, &SetOptions::new().tag("fixtures")).await;
//!
//! let limiter = RateLimiter::from_config(store, clock, &config);
//! let decision = limiter.check("203.0.113.7", &limiter.default_options()).await;
//! ```

pub mod cache;
pub mod config;
pub mod keys;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod rate_limit;
pub mod redis_store;
pub mod stats;

pub use cache::{CacheEntry, CacheMetadata, CacheStore, GetOptions, RefreshFn, SetOptions};
pub use config::loader::load_config;
pub use config::{BrixConfig, CacheConfig, LoggingConfig, RateLimitConfig, RedisConfig};
pub use keys::Namespace;
pub use middleware::{RateLimitState, rate_limit_middleware};
pub use observability::{apply_logging_level, init_tracing, init_tracing_from_config};
pub use rate_limit::{RateLimitOptions, RateLimitResult, RateLimiter};
pub use redis_store::{RedisStore, create_store};
pub use stats::{AdminSnapshot, CacheStats, KeyStats, RateLimitStats, TagStats};
