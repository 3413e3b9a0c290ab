//! In-memory key-value backend for brix.
//!
//! This crate provides an in-memory implementation of the `KvStore` trait
//! from `brix-store`. Expiry is evaluated against an injected clock, which
//! makes it the backend of choice for simulated-time tests.
//!
//! # Example
//!
//! ```ignore
//! use brix_store::{KvStore, ManualClock};
//! use brix_store_memory::InMemoryStore;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::starting_now());
//! let store = InMemoryStore::new(clock.clone());
//! store.set_px("greeting", b"hello", 1_000).await?;
//! clock.advance_ms(1_000);
//! assert!(store.get("greeting").await?.is_none());
//! ```

mod glob;
mod store;

pub use brix_store::{KvStore, StoreError};
pub use store::InMemoryStore;

/// Creates a new in-memory store behind the shared trait object.
pub fn create_memory_store(clock: brix_store::DynClock) -> brix_store::DynKvStore {
    std::sync::Arc::new(InMemoryStore::new(clock))
}
