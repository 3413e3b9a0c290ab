//! The store capability trait shared by the cache and the rate limiter.

use async_trait::async_trait;

use crate::StoreResult;
use crate::types::{MemoryInfo, Reply, ScanPage, ScoreBound, Transaction, Ttl};

/// Capability boundary over the shared key-value backend.
///
/// Every service instance talks to the same backend through this trait, so it
/// is the only coordination point between processes. Implementations must be
/// thread-safe (`Send + Sync`) and must execute [`exec`](KvStore::exec)
/// atomically: either every queued command is applied or none is, and no other
/// client observes an intermediate state.
///
/// # Example
///
/// ```ignore
/// use brix_store::{KvStore, StoreResult};
///
/// async fn touch(store: &dyn KvStore, key: &str) -> StoreResult<bool> {
///     Ok(store.get(key).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Short backend identifier (`"redis"`, `"memory"`).
    fn backend_name(&self) -> &'static str;

    /// Round-trips to the backend.
    async fn ping(&self) -> StoreResult<()>;

    // ==================== Strings ====================

    /// Reads a string value. Returns `None` if the key is missing or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes a string value with a millisecond TTL.
    async fn set_px(&self, key: &str, value: &[u8], ttl_ms: u64) -> StoreResult<()>;

    /// Deletes keys of any type. Returns how many keys actually existed.
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    // ==================== Sets ====================

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Removes members from a set. Returns how many were present.
    async fn srem(&self, key: &str, members: &[String]) -> StoreResult<u64>;

    async fn scard(&self, key: &str) -> StoreResult<u64>;

    // ==================== Sorted sets ====================

    /// Counts members whose score lies within `[min, max]`.
    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64>;

    // ==================== Keyspace ====================

    /// Probes the remaining time-to-live of a key.
    async fn pttl(&self, key: &str) -> StoreResult<Ttl>;

    /// Returns one page of keys matching a glob `pattern`.
    ///
    /// Start with cursor `0`; iteration is complete when the returned cursor
    /// is `0` again. `count` is a hint, not a limit. A key present for the
    /// whole iteration is returned at least once; keys may repeat.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage>;

    // ==================== Transactions ====================

    /// Executes all queued commands atomically, returning one reply per command.
    async fn exec(&self, tx: Transaction) -> StoreResult<Vec<Reply>>;

    // ==================== Introspection ====================

    async fn memory_info(&self) -> StoreResult<MemoryInfo>;
}

/// Collects every key matching `pattern` by walking the cursor to completion.
///
/// Duplicates reported by the backend are removed.
pub async fn scan_all(
    store: &dyn KvStore,
    pattern: &str,
    count: usize,
) -> StoreResult<Vec<String>> {
    let mut cursor = 0;
    let mut keys = Vec::new();
    loop {
        let page = store.scan(cursor, pattern, count).await?;
        keys.extend(page.keys);
        if page.cursor == 0 {
            break;
        }
        cursor = page.cursor;
    }
    keys.sort_unstable();
    keys.dedup();
    Ok(keys)
}
