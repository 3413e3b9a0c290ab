//! Background refresh for stale-while-revalidate reads.
//!
//! A stale read hands the key to a refresh task and returns immediately. At
//! most one refresh per key runs at a time within a [`RefreshGuard`]; readers
//! that arrive while one is in flight are served stale data without spawning
//! another.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;

use crate::metrics;

/// Hook invoked with the (un-namespaced) cache key of a stale entry.
///
/// Typically recomputes the value and calls `CacheStore::set` again.
///
/// ```ignore
/// let cache = cache.with_refresher(Arc::new(move |key: String| {
///     let cache = cache_handle.clone();
///     Box::pin(async move {
///         let fresh = load_fixtures(&key).await;
///         cache.set(&key, &fresh, &SetOptions::new()).await;
///     })
/// }));
/// ```
pub type RefreshFn = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Tracks keys with a refresh in flight.
#[derive(Debug, Clone, Default)]
pub(crate) struct RefreshGuard {
    inflight: Arc<DashMap<String, ()>>,
}

impl RefreshGuard {
    /// Spawns the future built by `make` unless a refresh is already running
    /// for `key`. `make` is not called for a coalesced refresh.
    ///
    /// Returns `true` if a task was spawned.
    pub(crate) fn spawn<M, F>(&self, key: &str, make: M) -> bool
    where
        M: FnOnce() -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        if self.inflight.insert(key.to_string(), ()).is_some() {
            tracing::debug!(key = %key, "refresh already in flight");
            metrics::record_refresh("coalesced");
            return false;
        }

        let slot = InflightSlot {
            inflight: Arc::clone(&self.inflight),
            key: key.to_string(),
        };
        let refresh = make();
        tokio::spawn(async move {
            // Released on completion and on panic.
            let _slot = slot;
            refresh.await;
        });
        metrics::record_refresh("spawned");
        true
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

struct InflightSlot {
    inflight: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for InflightSlot {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_second_refresh_is_coalesced() {
        let guard = RefreshGuard::default();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        assert!(guard.spawn("k", || async move {
            let _ = release_rx.await;
        }));
        assert!(!guard.spawn("k", || -> std::future::Ready<()> {
            panic!("coalesced refresh must not be built")
        }));
        assert!(guard.spawn("other", || async {}));

        release_tx.send(()).unwrap();
        for _ in 0..50 {
            if guard.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(guard.in_flight(), 0);
        assert!(guard.spawn("k", || async {}));
    }
}
