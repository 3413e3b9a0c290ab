//! TimeoutStore - a store wrapper that bounds every call with a deadline.
//!
//! A call that outlives its deadline is abandoned and reported as
//! [`StoreError::Timeout`], so callers treat a slow backend exactly like an
//! unreachable one.
//!
//! # Example
//!
//! ```ignore
//! use brix_store::TimeoutStore;
//! use std::time::Duration;
//!
//! let store = TimeoutStore::new(redis_store, Duration::from_millis(250));
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::KvStore;
use crate::types::{MemoryInfo, Reply, ScanPage, ScoreBound, Transaction, Ttl};
use crate::StoreResult;

/// A store wrapper that applies a per-call timeout to an inner store.
pub struct TimeoutStore<S: KvStore> {
    inner: S,
    timeout: Duration,
}

impl<S: KvStore> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = StoreResult<T>> + Send,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store call exceeded deadline"
                );
                Err(StoreError::timeout(operation, self.timeout))
            }
        }
    }
}

#[async_trait]
impl<S: KvStore> KvStore for TimeoutStore<S> {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn ping(&self) -> StoreResult<()> {
        self.bounded("ping", self.inner.ping()).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn set_px(&self, key: &str, value: &[u8], ttl_ms: u64) -> StoreResult<()> {
        self.bounded("set_px", self.inner.set_px(key, value, ttl_ms))
            .await
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        self.bounded("del", self.inner.del(keys)).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.bounded("smembers", self.inner.smembers(key)).await
    }

    async fn srem(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        self.bounded("srem", self.inner.srem(key, members)).await
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        self.bounded("scard", self.inner.scard(key)).await
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64> {
        self.bounded("zcount", self.inner.zcount(key, min, max))
            .await
    }

    async fn pttl(&self, key: &str) -> StoreResult<Ttl> {
        self.bounded("pttl", self.inner.pttl(key)).await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        self.bounded("scan", self.inner.scan(cursor, pattern, count))
            .await
    }

    async fn exec(&self, tx: Transaction) -> StoreResult<Vec<Reply>> {
        self.bounded("exec", self.inner.exec(tx)).await
    }

    async fn memory_info(&self) -> StoreResult<MemoryInfo> {
        self.bounded("memory_info", self.inner.memory_info()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers every call after a fixed delay.
    struct SlowStore {
        delay: Duration,
    }

    impl SlowStore {
        async fn wait(&self) {
            tokio::time::sleep(self.delay).await;
        }
    }

    #[async_trait]
    impl KvStore for SlowStore {
        fn backend_name(&self) -> &'static str {
            "slow"
        }
        async fn ping(&self) -> StoreResult<()> {
            self.wait().await;
            Ok(())
        }
        async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.wait().await;
            Ok(Some(b"value".to_vec()))
        }
        async fn set_px(&self, _key: &str, _value: &[u8], _ttl_ms: u64) -> StoreResult<()> {
            self.wait().await;
            Ok(())
        }
        async fn del(&self, keys: &[String]) -> StoreResult<u64> {
            self.wait().await;
            Ok(keys.len() as u64)
        }
        async fn smembers(&self, _key: &str) -> StoreResult<Vec<String>> {
            self.wait().await;
            Ok(Vec::new())
        }
        async fn srem(&self, _key: &str, _members: &[String]) -> StoreResult<u64> {
            self.wait().await;
            Ok(0)
        }
        async fn scard(&self, _key: &str) -> StoreResult<u64> {
            self.wait().await;
            Ok(0)
        }
        async fn zcount(&self, _key: &str, _min: ScoreBound, _max: ScoreBound) -> StoreResult<u64> {
            self.wait().await;
            Ok(0)
        }
        async fn pttl(&self, _key: &str) -> StoreResult<Ttl> {
            self.wait().await;
            Ok(Ttl::Missing)
        }
        async fn scan(&self, _cursor: u64, _pattern: &str, _count: usize) -> StoreResult<ScanPage> {
            self.wait().await;
            Ok(ScanPage::default())
        }
        async fn exec(&self, tx: Transaction) -> StoreResult<Vec<Reply>> {
            self.wait().await;
            Ok(tx.commands().iter().map(|_| Reply::Ok).collect())
        }
        async fn memory_info(&self) -> StoreResult<MemoryInfo> {
            self.wait().await;
            Ok(MemoryInfo::default())
        }
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let store = TimeoutStore::new(
            SlowStore {
                delay: Duration::from_millis(1),
            },
            Duration::from_secs(5),
        );

        assert_eq!(store.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(store.backend_name(), "slow");
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let store = TimeoutStore::new(
            SlowStore {
                delay: Duration::from_secs(5),
            },
            Duration::from_millis(20),
        );

        let err = store.exec(Transaction::new()).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timed out after 20ms: exec");
    }
}
