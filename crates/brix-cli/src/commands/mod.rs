pub mod cache;
pub mod health;
pub mod limit;

use brix_cache::{BrixConfig, CacheStore, RateLimiter, create_store};
use brix_store::{DynKvStore, SystemClock};

/// Handles shared by every command.
pub struct Context {
    pub config: BrixConfig,
    pub store: DynKvStore,
    pub cache: CacheStore,
    pub limiter: RateLimiter,
}

impl Context {
    pub async fn connect(config: BrixConfig) -> Self {
        let clock = SystemClock::shared();
        let store = create_store(&config.redis, clock.clone()).await;
        let cache = CacheStore::from_config(store.clone(), clock.clone(), &config);
        let limiter = RateLimiter::from_config(store.clone(), clock, &config);
        Self {
            config,
            store,
            cache,
            limiter,
        }
    }

    /// `true` when commands would only see this process's private store.
    pub fn is_local(&self) -> bool {
        self.store.backend_name() != "redis"
    }
}
