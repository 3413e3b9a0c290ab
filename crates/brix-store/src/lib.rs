//! # brix-store
//!
//! Key-value store abstraction for the brix cache and rate limiter.
//!
//! This crate defines the capability boundary that every backend must offer.
//! It does not contain a networked implementation - the Redis store lives in
//! `brix-cache` and the in-memory store in `brix-store-memory`.
//!
//! ## Overview
//!
//! The main trait is [`KvStore`], which covers:
//! - string values with millisecond TTL
//! - sets (add/remove/enumerate/cardinality)
//! - sorted sets scored by millisecond timestamps
//! - atomic multi-command [`Transaction`]s
//! - cursor-paged key enumeration
//!
//! ## Example
//!
//! ```ignore
//! use brix_store::{KvStore, ScoreBound, StoreResult, Transaction};
//!
//! async fn hits_in_last_minute(store: &dyn KvStore, key: &str, now: i64) -> StoreResult<u64> {
//!     store
//!         .zcount(key, ScoreBound::Exclusive(now - 60_000), ScoreBound::Inclusive(now))
//!         .await
//! }
//! ```

pub mod clock;
mod error;
pub mod timeout;
mod traits;
mod types;

pub use clock::{Clock, DynClock, ManualClock, SystemClock};
pub use error::{ErrorCategory, StoreError};
pub use timeout::TimeoutStore;
pub use traits::{KvStore, scan_all};
pub use types::{Command, ExpireCondition, MemoryInfo, Reply, ScanPage, ScoreBound, Transaction, Ttl};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shareable store trait object.
pub type DynKvStore = std::sync::Arc<dyn KvStore>;
