//! Cache store boundary.
//!
//! The engine is the only component that touches the cache store: it looks
//! entries up during the cache-or-network decision and writes freshly
//! downloaded bodies back afterwards. Transfers never see the store.
//!
//! Two implementations are provided: [`MemoryCacheStore`] for tests and
//! embedders that want a bounded-lifetime cache, and [`DiskCacheStore`] for
//! persistence across runs. Eviction is deliberately out of scope; wrap a
//! store if you need one.

mod disk;
mod memory;
mod store;
mod types;

pub use disk::{default_cache_dir, DiskCacheStore};
pub use memory::MemoryCacheStore;
pub use store::{CacheEntry, CacheStore, ReadableEntry};
pub use types::{CacheError, CacheKey, EntryMetadata};
