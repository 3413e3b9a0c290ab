use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrixConfig {
    /// Prefix for every key this process writes, e.g. `brix:cache:...`.
    /// Separate namespaces never see each other's entries or windows.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_namespace() -> String {
    "brix".into()
}

impl Default for BrixConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            redis: RedisConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BrixConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.trim().is_empty() {
            return Err("namespace must not be empty".into());
        }
        if self.redis.enabled && self.redis.url.trim().is_empty() {
            return Err("redis.url must be set when redis is enabled".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.cache.clear_batch_size == 0 {
            return Err("cache.clear_batch_size must be > 0".into());
        }
        if self.cache.scan_count == 0 {
            return Err("cache.scan_count must be > 0".into());
        }
        let prefix = self.rate_limit.key_prefix.as_str();
        if prefix.is_empty() {
            return Err("rate_limit.key_prefix must not be empty".into());
        }
        // These segments belong to the cache keyspace.
        if prefix == "cache" || prefix == "tag" {
            return Err(format!("rate_limit.key_prefix '{prefix}' is reserved"));
        }
        Ok(())
    }
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis as the shared store. When disabled (or unreachable at
    /// startup) an in-process store is used and nothing is shared.
    /// Default: false
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Deadline for a single store call in milliseconds; 0 disables it.
    /// A call that misses its deadline is handled like a backend error.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

fn default_operation_timeout_ms() -> u64 {
    1000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_ms > 0).then(|| Duration::from_millis(self.operation_timeout_ms))
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when `set()` is called without one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// How long an entry stays readable in the store after it goes stale.
    /// Tag index sets are kept alive for the same window. 0 makes the store
    /// TTL equal to the entry TTL, which disables stale reads.
    #[serde(default = "default_stale_retention_secs")]
    pub stale_retention_secs: u64,

    /// Upper bound on staleness when a `get()` does not set `max_stale_age`
    #[serde(default = "default_max_stale_age_secs")]
    pub max_stale_age_secs: u64,

    /// Keys deleted per `DEL` during `clear()`
    #[serde(default = "default_clear_batch_size")]
    pub clear_batch_size: usize,

    /// `COUNT` hint for cursor scans
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_stale_retention_secs() -> u64 {
    86_400 // 24 hours
}

fn default_max_stale_age_secs() -> u64 {
    86_400
}

fn default_clear_batch_size() -> usize {
    1000
}

fn default_scan_count() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            stale_retention_secs: default_stale_retention_secs(),
            max_stale_age_secs: default_max_stale_age_secs(),
            clear_batch_size: default_clear_batch_size(),
            scan_count: default_scan_count(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn stale_retention(&self) -> Duration {
        Duration::from_secs(self.stale_retention_secs)
    }

    pub fn max_stale_age(&self) -> Duration {
        Duration::from_secs(self.max_stale_age_secs)
    }
}

/// Rate limiter defaults, used when a caller passes zero values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    100
}

fn default_key_prefix() -> String {
    "ratelimit".into()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `brix_cache=debug,warn`.
    /// `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Colored output. Turn off when logs go to a file or collector.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Single-line events without span context.
    #[serde(default)]
    pub compact: bool,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: true,
            compact: false,
        }
    }
}

pub mod loader {
    use super::BrixConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<BrixConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("brix.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., BRIX__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("BRIX")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: BrixConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
