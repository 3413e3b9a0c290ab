//! Shared cache with tag invalidation and stale-while-revalidate reads.

mod entry;
mod options;
mod refresh;
mod store;

pub use entry::{CacheEntry, CacheMetadata, compute_etag};
pub use options::{GetOptions, SetOptions};
pub use refresh::RefreshFn;
pub use store::CacheStore;
