//! Deferred resolution of properties populated by nested queries.

use rowmap_cache::CacheKey;
use rowmap_core::{DataObject, PropertyWriter, Result, RowmapError};

use crate::extractor::{self, ResultShape};
use crate::local::{CacheEntry, LocalCache};

/// A property assignment parked until the query that produces its value
/// has finished and published its rows to the local cache.
///
/// Entries are consumed exactly once, in enqueue order, when the session's
/// nesting depth returns to zero.
#[derive(Debug)]
pub struct DeferredLoad {
    target: DataObject,
    property: String,
    key: CacheKey,
    shape: ResultShape,
}

impl DeferredLoad {
    pub fn new(
        target: DataObject,
        property: impl Into<String>,
        key: CacheKey,
        shape: ResultShape,
    ) -> Self {
        Self {
            target,
            property: property.into(),
            key,
            shape,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// True once the local cache holds a finished result for the key.
    /// A placeholder does not count; the producing query is still running.
    pub fn can_load(&self, cache: &LocalCache) -> bool {
        cache.is_ready(&self.key)
    }

    /// Extract the cached rows into the declared shape and assign them to
    /// the target property.
    ///
    /// A key that never became ready means the producing query was never
    /// run to completion, which is a wiring bug upstream, not a cache miss
    /// to retry.
    pub fn load(&self, cache: &LocalCache, writer: &dyn PropertyWriter) -> Result<()> {
        match cache.lookup(&self.key) {
            Some(CacheEntry::Ready(rows)) => {
                let value = extractor::extract(rows, self.shape)?;
                writer.set_property(&self.target, &self.property, value)
            }
            _ => Err(RowmapError::DeferredMiss {
                property: self.property.clone(),
            }),
        }
    }
}
