//! Read-only statistics for dashboards and the operator CLI.
//!
//! Every figure comes from a cursor scan of the shared store, so numbers are
//! approximate under concurrent writes.

use brix_store::{MemoryInfo, ScoreBound, StoreResult, scan_all};
use serde::Serialize;
use time::OffsetDateTime;

use crate::cache::CacheStore;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub backend: String,
    pub memory: MemoryInfo,
    pub keys: KeyStats,
    pub tags: TagStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStats {
    pub total: u64,
    /// Keys the store reported as gone or at zero remaining TTL while probing.
    pub expired: u64,
    /// `total - expired`. Includes `stale` entries.
    pub active: u64,
    /// Entries still held by the store but past their own `expiresAt`; only
    /// stale-while-revalidate reads can see them.
    pub stale: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagStats {
    pub total_tags: u64,
    /// Sum of tag set sizes; an entry with two tags counts twice.
    pub total_tagged_keys: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub key_prefix: String,
    /// Window keys currently present under the prefix.
    pub active_windows: u64,
    /// Request stamps held across those windows, pruned or not.
    pub tracked_requests: u64,
}

impl CacheStore {
    /// Collects key, tag and memory figures for this namespace.
    ///
    /// Returns `None` if the store fails.
    pub async fn stats(&self) -> Option<CacheStats> {
        match self.collect_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                self.report_failure("stats", self.namespace().name(), &e);
                None
            }
        }
    }

    async fn collect_stats(&self) -> StoreResult<CacheStats> {
        let store = self.store().as_ref();
        let scan_count = self.config().scan_count;

        let memory = store.memory_info().await?;

        let cache_keys = scan_all(store, &self.namespace().cache_pattern(), scan_count).await?;
        let mut keys = KeyStats {
            total: cache_keys.len() as u64,
            ..KeyStats::default()
        };
        let now = self.now_ms();
        for key in &cache_keys {
            if store.pttl(key).await?.is_exhausted() {
                keys.expired += 1;
            } else if self
                .stored_metadata(key)
                .await?
                .is_some_and(|meta| !meta.is_fresh(now))
            {
                keys.stale += 1;
            }
        }
        keys.active = keys.total - keys.expired;

        let tag_keys = scan_all(store, &self.namespace().tag_pattern(), scan_count).await?;
        let mut tags = TagStats {
            total_tags: tag_keys.len() as u64,
            ..TagStats::default()
        };
        for tag_key in &tag_keys {
            tags.total_tagged_keys += store.scard(tag_key).await?;
        }

        Ok(CacheStats {
            backend: store.backend_name().to_string(),
            memory,
            keys,
            tags,
        })
    }
}

impl RateLimiter {
    /// Counts live windows and stamps under `key_prefix`.
    ///
    /// Returns `None` if the store fails.
    pub async fn stats(&self, key_prefix: &str) -> Option<RateLimitStats> {
        match self.collect_stats(key_prefix).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(
                    prefix = %key_prefix,
                    backend = self.backend_name(),
                    error = %e,
                    "rate limit stats failed"
                );
                crate::metrics::record_store_error("stats", e.category());
                None
            }
        }
    }

    async fn collect_stats(&self, key_prefix: &str) -> StoreResult<RateLimitStats> {
        let store = self.store().as_ref();
        let windows = scan_all(store, &self.namespace().window_pattern(key_prefix), 100).await?;

        let mut tracked_requests = 0;
        for window in &windows {
            tracked_requests += store
                .zcount(window, ScoreBound::NegInf, ScoreBound::PosInf)
                .await?;
        }

        Ok(RateLimitStats {
            key_prefix: key_prefix.to_string(),
            active_windows: windows.len() as u64,
            tracked_requests,
        })
    }
}

/// Point-in-time view of the cache and rate limiter, for admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSnapshot {
    /// RFC 3339 timestamp of collection.
    pub collected_at: String,
    pub namespace: String,
    pub cache: Option<CacheStats>,
    pub rate_limit: Option<RateLimitStats>,
}

impl AdminSnapshot {
    /// Gathers stats for the cache and the limiter's default prefix.
    ///
    /// A failed section is `None`; the snapshot itself always succeeds.
    pub async fn collect(cache: &CacheStore, limiter: &RateLimiter) -> Self {
        let prefix = limiter.default_options().key_prefix;
        let (cache_stats, limit_stats) = tokio::join!(cache.stats(), limiter.stats(&prefix));

        let collected_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();

        Self {
            collected_at,
            namespace: cache.namespace().name().to_string(),
            cache: cache_stats,
            rate_limit: limit_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_json_shape() {
        let stats = CacheStats {
            backend: "memory".into(),
            memory: MemoryInfo::default(),
            keys: KeyStats {
                total: 3,
                expired: 1,
                active: 2,
                stale: 1,
            },
            tags: TagStats {
                total_tags: 1,
                total_tagged_keys: 2,
            },
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["keys"]["active"], 2);
        assert_eq!(json["keys"]["stale"], 1);
        assert_eq!(json["tags"]["totalTaggedKeys"], 2);
        assert_eq!(json["backend"], "memory");
    }
}
