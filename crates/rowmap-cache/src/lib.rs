//! Rowmap Cache - the shared, cross-session result cache
//!
//! A shared cache is a chain of store decorators assembled by `CacheBuilder`
//! from a `CacheConfig`: a base store (registered by name in a
//! `StoreRegistry`), eviction policies in declared order, an optional
//! interval flush, optional serialization isolation, hit/miss statistics,
//! and finally the `SharedCache` synchronization boundary with its optional
//! per-key blocking layer. `CacheKey` is the composite identity both the
//! shared cache and each session's local cache are keyed by.

mod builder;
mod config;
mod decorators;
mod key;
mod registry;
mod shared;
mod store;

pub use builder::CacheBuilder;
pub use config::{
    CacheConfig, DEFAULT_BLOCKING_TIMEOUT_MS, DEFAULT_CAPACITY, DEFAULT_HOT_SIZE, EvictionPolicy,
};
pub use decorators::{FifoPolicy, IntervalFlush, LruPolicy, Serialized, StatsLayer, TwoTierPolicy};
pub use key::CacheKey;
pub use registry::{StoreConstructor, StoreRegistry};
pub use shared::{CacheStats, SharedCache};
pub use store::{CacheStore, MemoryStore, StoredValue};
