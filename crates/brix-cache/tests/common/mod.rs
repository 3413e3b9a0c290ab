//! Shared fixtures for brix-cache integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use brix_cache::{CacheConfig, CacheStore, RateLimitConfig, RateLimiter};
use brix_store::{
    DynKvStore, KvStore, ManualClock, MemoryInfo, Reply, ScanPage, ScoreBound, StoreError,
    StoreResult, Transaction, Ttl,
};
use brix_store_memory::InMemoryStore;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// 2023-11-14T22:13:20Z
pub const START_MS: i64 = 1_700_000_000_000;

/// Cache and limiter over one in-memory store driven by a manual clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: DynKvStore,
    pub cache: CacheStore,
    pub limiter: RateLimiter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cache_config(CacheConfig::default())
    }

    pub fn with_cache_config(config: CacheConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let store: DynKvStore = Arc::new(InMemoryStore::new(clock.clone()));
        let cache = CacheStore::new(store.clone(), clock.clone(), config);
        let limiter = RateLimiter::new(store.clone(), clock.clone(), RateLimitConfig::default());
        Self {
            clock,
            store,
            cache,
            limiter,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// A store whose every call fails as if the backend were unreachable.
#[derive(Debug, Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::connection("connection refused"))
    }
}

#[async_trait]
impl KvStore for FailingStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.fail()
    }

    async fn set_px(&self, _key: &str, _value: &[u8], _ttl_ms: u64) -> StoreResult<()> {
        self.fail()
    }

    async fn del(&self, _keys: &[String]) -> StoreResult<u64> {
        self.fail()
    }

    async fn smembers(&self, _key: &str) -> StoreResult<Vec<String>> {
        self.fail()
    }

    async fn srem(&self, _key: &str, _members: &[String]) -> StoreResult<u64> {
        self.fail()
    }

    async fn scard(&self, _key: &str) -> StoreResult<u64> {
        self.fail()
    }

    async fn zcount(&self, _key: &str, _min: ScoreBound, _max: ScoreBound) -> StoreResult<u64> {
        self.fail()
    }

    async fn pttl(&self, _key: &str) -> StoreResult<Ttl> {
        self.fail()
    }

    async fn scan(&self, _cursor: u64, _pattern: &str, _count: usize) -> StoreResult<ScanPage> {
        self.fail()
    }

    async fn exec(&self, _tx: Transaction) -> StoreResult<Vec<Reply>> {
        self.fail()
    }

    async fn memory_info(&self) -> StoreResult<MemoryInfo> {
        self.fail()
    }
}

/// A store that never answers.
#[derive(Debug, Default)]
pub struct HangingStore;

#[async_trait]
impl KvStore for HangingStore {
    fn backend_name(&self) -> &'static str {
        "hanging"
    }

    async fn ping(&self) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        std::future::pending().await
    }

    async fn set_px(&self, _key: &str, _value: &[u8], _ttl_ms: u64) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn del(&self, _keys: &[String]) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn smembers(&self, _key: &str) -> StoreResult<Vec<String>> {
        std::future::pending().await
    }

    async fn srem(&self, _key: &str, _members: &[String]) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn scard(&self, _key: &str) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn zcount(&self, _key: &str, _min: ScoreBound, _max: ScoreBound) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn pttl(&self, _key: &str) -> StoreResult<Ttl> {
        std::future::pending().await
    }

    async fn scan(&self, _cursor: u64, _pattern: &str, _count: usize) -> StoreResult<ScanPage> {
        std::future::pending().await
    }

    async fn exec(&self, _tx: Transaction) -> StoreResult<Vec<Reply>> {
        std::future::pending().await
    }

    async fn memory_info(&self) -> StoreResult<MemoryInfo> {
        std::future::pending().await
    }
}

/// Log lines captured from a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Installs a WARN-level subscriber for the current thread.
    ///
    /// Use with the default single-threaded `#[tokio::test]` runtime.
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn warnings(&self) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains("WARN"))
            .count()
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap().clear();
    }
}

pub struct CapturedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}
