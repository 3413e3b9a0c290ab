//! Tagged, stale-while-revalidate cache over a shared [`KvStore`].

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use brix_store::{DynClock, DynKvStore, Reply, StoreError, StoreResult, Transaction};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use super::entry::{CacheEntry, CacheMetadata, compute_etag};
use super::options::{GetOptions, SetOptions};
use super::refresh::{RefreshFn, RefreshGuard};
use crate::config::{BrixConfig, CacheConfig};
use crate::keys::Namespace;
use crate::metrics;

/// Longest expiry handed to the store (100 years). Redis rejects deadlines
/// that overflow its millisecond clock.
const MAX_STORE_TTL_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

/// Outcome of reading one entry.
enum Lookup<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

/// Shared cache used by every service instance.
///
/// ## Failure model
///
/// The cache is an optimization, so store failures never reach callers:
///
/// | Operation          | On backend error                     |
/// |--------------------|--------------------------------------|
/// | `get`              | miss (`None`)                        |
/// | `set`              | `true`, write is lost (metric bumped) |
/// | `delete`           | `false`                              |
/// | `invalidate_tags`  | count removed so far                 |
/// | `clear`            | `false`                              |
///
/// Each failing call logs exactly one warning.
///
/// Cloning is cheap and clones share the refresh single-flight guard.
#[derive(Clone)]
pub struct CacheStore {
    store: DynKvStore,
    clock: DynClock,
    ns: Namespace,
    config: CacheConfig,
    refresher: Option<RefreshFn>,
    refreshes: RefreshGuard,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.store.backend_name())
            .field("namespace", &self.ns.name())
            .field("config", &self.config)
            .field("refresher", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Creates a cache in the default `brix` namespace.
    pub fn new(store: DynKvStore, clock: DynClock, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            ns: Namespace::new("brix"),
            config,
            refresher: None,
            refreshes: RefreshGuard::default(),
        }
    }

    pub fn from_config(store: DynKvStore, clock: DynClock, config: &BrixConfig) -> Self {
        Self::new(store, clock, config.cache.clone()).with_namespace(&config.namespace)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.ns = Namespace::new(namespace);
        self
    }

    /// Registers the hook run in the background when a stale entry is served.
    pub fn with_refresher(mut self, refresher: RefreshFn) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub(crate) fn store(&self) -> &DynKvStore {
        &self.store
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    // ==================== Reads ====================

    /// Reads a cached value.
    ///
    /// Returns fresh data while `now <= expires_at`. Past expiry, data is only
    /// returned when `stale_while_revalidate` is set and the entry has been
    /// stale for at most `max_stale_age`; the registered refresher then runs in
    /// the background.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: &GetOptions) -> Option<T> {
        match self.lookup(key, options).await {
            Lookup::Fresh(value) => Some(value),
            Lookup::Stale(value) => {
                self.schedule_refresh(key);
                Some(value)
            }
            Lookup::Miss => None,
        }
    }

    /// Cache-aside read.
    ///
    /// On a miss `loader` runs inline and its value is stored with `set_options`.
    /// On a stale hit the stale value is returned and `loader` re-runs in the
    /// background. Loader errors on a miss are returned to the caller.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        get_options: &GetOptions,
        set_options: &SetOptions,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        E: fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.lookup(key, get_options).await {
            Lookup::Fresh(value) => Ok(value),
            Lookup::Stale(value) => {
                let cache = self.clone();
                let owned_key = key.to_string();
                let set_options = set_options.clone();
                self.refreshes.spawn(key, move || async move {
                    match loader().await {
                        Ok(fresh) => {
                            cache.set(&owned_key, &fresh, &set_options).await;
                        }
                        Err(e) => {
                            tracing::warn!(key = %owned_key, error = %e, "background reload failed");
                        }
                    }
                });
                Ok(value)
            }
            Lookup::Miss => {
                let value = loader().await?;
                self.set(key, &value, set_options).await;
                Ok(value)
            }
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str, options: &GetOptions) -> Lookup<T> {
        if options.no_cache {
            metrics::record_cache_miss();
            return Lookup::Miss;
        }

        let entry = match self.read_entry::<T>(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_miss();
                return Lookup::Miss;
            }
            Err(e) => {
                self.report_failure("get", key, &e);
                metrics::record_cache_miss();
                return Lookup::Miss;
            }
        };

        let now = self.clock.now_ms();
        let meta = &entry.metadata;
        if meta.is_fresh(now) {
            tracing::debug!(key = %key, "cache hit");
            metrics::record_cache_hit("fresh");
            return Lookup::Fresh(entry.data);
        }

        let max_stale = options
            .max_stale_age
            .unwrap_or_else(|| self.config.max_stale_age());
        let max_stale_ms = i64::try_from(duration_ms(max_stale)).unwrap_or(i64::MAX);
        if options.serves_stale() && meta.stale_for_ms(now) <= max_stale_ms {
            tracing::debug!(key = %key, stale_ms = meta.stale_for_ms(now), "serving stale entry");
            metrics::record_cache_hit("stale");
            return Lookup::Stale(entry.data);
        }

        tracing::debug!(key = %key, stale_ms = meta.stale_for_ms(now), "cache entry expired");
        metrics::record_cache_miss();
        Lookup::Miss
    }

    /// Fetches and decodes an entry. Undecodable payloads are a miss.
    async fn read_entry<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> StoreResult<Option<CacheEntry<T>>> {
        let Some(raw) = self.store.get(&self.ns.cache_key(key)).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<CacheEntry<T>>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding malformed cache entry");
                Ok(None)
            }
        }
    }

    fn schedule_refresh(&self, key: &str) {
        let Some(refresher) = &self.refresher else {
            tracing::debug!(key = %key, "stale entry served without a refresher");
            return;
        };
        let refresher = Arc::clone(refresher);
        let owned_key = key.to_string();
        self.refreshes.spawn(key, move || refresher(owned_key));
    }

    // ==================== Writes ====================

    /// Stores `value` under `key`.
    ///
    /// The entry, its tag memberships and the tag set expiries are written in
    /// one atomic transaction. Returns `false` only when the value cannot be
    /// serialized; a backend failure is logged and still returns `true`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: &SetOptions,
    ) -> bool {
        if options.no_store {
            metrics::record_cache_write("skipped");
            return true;
        }

        let ttl = self.effective_ttl(key, options.ttl);
        let tags: BTreeSet<String> = options.tags.iter().cloned().collect();
        let payload = match self.encode(value, ttl, &tags) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache value is not serializable");
                metrics::record_store_error("set", e.category());
                return false;
            }
        };

        match self.write(key, payload, ttl, &tags).await {
            Ok(()) => {
                tracing::debug!(key = %key, ttl_ms = duration_ms(ttl), tags = tags.len(), "cache set");
                metrics::record_cache_write("stored");
            }
            Err(e) => {
                self.report_failure("set", key, &e);
                metrics::record_cache_write("degraded");
            }
        }
        true
    }

    fn effective_ttl(&self, key: &str, requested: Option<Duration>) -> Duration {
        match requested {
            Some(ttl) if duration_ms(ttl) > 0 => ttl,
            Some(ttl) => {
                tracing::warn!(
                    key = %key,
                    ttl_ms = ttl.as_millis() as u64,
                    default_ttl_secs = self.config.default_ttl_secs,
                    "ttl below 1ms, using default"
                );
                self.config.default_ttl()
            }
            None => self.config.default_ttl(),
        }
    }

    fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
        ttl: Duration,
        tags: &BTreeSet<String>,
    ) -> StoreResult<Vec<u8>> {
        let cached_at = self.clock.now_ms();
        let etag = compute_etag(value).map_err(|e| StoreError::serialization(e.to_string()))?;
        let entry = CacheEntry {
            data: value,
            metadata: CacheMetadata {
                cached_at,
                expires_at: cached_at
                    .saturating_add(i64::try_from(duration_ms(ttl)).unwrap_or(i64::MAX)),
                etag,
                tags: (!tags.is_empty()).then(|| tags.clone()),
            },
        };
        serde_json::to_vec(&entry).map_err(|e| StoreError::serialization(e.to_string()))
    }

    async fn write(
        &self,
        key: &str,
        payload: Vec<u8>,
        ttl: Duration,
        tags: &BTreeSet<String>,
    ) -> StoreResult<()> {
        let cache_key = self.ns.cache_key(key);
        let store_ttl_ms = duration_ms(ttl)
            .saturating_add(duration_ms(self.config.stale_retention()))
            .min(MAX_STORE_TTL_MS);

        // Tags the previous entry carried but this one drops.
        let previous = self
            .stored_metadata(&cache_key)
            .await?
            .and_then(|meta| meta.tags)
            .unwrap_or_default();

        let mut tx = Transaction::new();
        tx.set_px(&cache_key, payload, store_ttl_ms);
        for dropped in previous.difference(tags) {
            tx.srem(self.ns.tag_key(dropped), &cache_key);
        }
        for tag in tags {
            // A tag set lives as long as its longest-lived member.
            let tag_key = self.ns.tag_key(tag);
            tx.sadd(&tag_key, &cache_key).pexpire_extend(tag_key, store_ttl_ms);
        }
        self.store.exec(tx).await?;
        Ok(())
    }

    // ==================== Removal ====================

    /// Removes one entry and its tag memberships.
    ///
    /// Returns whether an entry was actually removed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.remove(key).await {
            Ok(removed) => {
                tracing::debug!(key = %key, removed, "cache delete");
                removed
            }
            Err(e) => {
                self.report_failure("delete", key, &e);
                false
            }
        }
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let cache_key = self.ns.cache_key(key);

        let tags = self
            .stored_metadata(&cache_key)
            .await?
            .and_then(|meta| meta.tags)
            .unwrap_or_default();

        let mut tx = Transaction::new();
        for tag in &tags {
            tx.srem(self.ns.tag_key(tag), &cache_key);
        }
        tx.del(vec![cache_key]);
        let replies = self.store.exec(tx).await?;

        Ok(replies.last().and_then(Reply::as_int).unwrap_or(0) > 0)
    }

    /// Reads an entry's metadata without decoding its payload.
    ///
    /// Missing and malformed entries both yield `None`.
    pub(crate) async fn stored_metadata(
        &self,
        cache_key: &str,
    ) -> StoreResult<Option<CacheMetadata>> {
        let Some(raw) = self.store.get(cache_key).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_slice::<CacheEntry<IgnoredAny>>(&raw)
            .ok()
            .map(|entry| entry.metadata))
    }

    /// Removes every entry carrying any of `tags`, along with the tag sets.
    ///
    /// Returns how many distinct entries were removed. Invalidating the same
    /// tags twice is harmless; the second call returns 0.
    pub async fn invalidate_tags<S: AsRef<str>>(&self, tags: &[S]) -> u64 {
        let mut removed = 0;
        for tag in tags {
            let tag = tag.as_ref();
            match self.invalidate_tag(tag).await {
                Ok(count) => removed += count,
                Err(e) => {
                    self.report_failure("invalidate_tags", tag, &e);
                    break;
                }
            }
        }
        tracing::debug!(tags = tags.len(), removed, "tags invalidated");
        metrics::record_invalidated(removed);
        removed
    }

    async fn invalidate_tag(&self, tag: &str) -> StoreResult<u64> {
        let tag_key = self.ns.tag_key(tag);

        // The index may lag behind a re-set that dropped the tag, so each
        // member's own metadata decides.
        let mut members = Vec::new();
        for member in self.store.smembers(&tag_key).await? {
            if !self.ns.owns_cache_key(&member) {
                continue;
            }
            let still_tagged = self
                .stored_metadata(&member)
                .await?
                .is_some_and(|meta| meta.tags().any(|t| t == tag));
            if still_tagged {
                members.push(member);
            }
        }

        let has_members = !members.is_empty();
        let mut tx = Transaction::new();
        if has_members {
            tx.del(members);
        }
        tx.del(vec![tag_key]);
        let replies = self.store.exec(tx).await?;

        if !has_members {
            return Ok(0);
        }
        Ok(replies
            .first()
            .and_then(Reply::as_int)
            .map_or(0, |n| n.max(0) as u64))
    }

    /// Removes every entry and tag set in this namespace.
    ///
    /// Keys are found with a cursor scan and deleted in batches of at most
    /// `clear_batch_size`.
    pub async fn clear(&self) -> bool {
        match self.clear_namespace().await {
            Ok(deleted) => {
                tracing::info!(namespace = %self.ns.name(), deleted, "cache cleared");
                true
            }
            Err(e) => {
                self.report_failure("clear", self.ns.name(), &e);
                false
            }
        }
    }

    async fn clear_namespace(&self) -> StoreResult<u64> {
        let batch_size = self.config.clear_batch_size.max(1);
        let mut deleted = 0;

        for pattern in [self.ns.cache_pattern(), self.ns.tag_pattern()] {
            let mut cursor = 0;
            let mut batch = Vec::with_capacity(batch_size);
            loop {
                let page = self
                    .store
                    .scan(cursor, &pattern, self.config.scan_count)
                    .await?;
                for key in page.keys {
                    batch.push(key);
                    if batch.len() >= batch_size {
                        deleted += self.store.del(&std::mem::take(&mut batch)).await?;
                    }
                }
                if page.cursor == 0 {
                    break;
                }
                cursor = page.cursor;
            }
            if !batch.is_empty() {
                deleted += self.store.del(&batch).await?;
            }
        }
        Ok(deleted)
    }

    pub(crate) fn report_failure(&self, operation: &'static str, key: &str, error: &StoreError) {
        tracing::warn!(
            operation,
            key = %key,
            backend = self.store.backend_name(),
            error = %error,
            "cache operation failed"
        );
        metrics::record_store_error(operation, error.category());
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
