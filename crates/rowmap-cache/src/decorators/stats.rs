//! Hit/miss statistics

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rowmap_core::Result;

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

/// Counts hits and misses into counters shared with the owning
/// `SharedCache`, logging the running ratio at debug on every lookup.
pub struct StatsLayer {
    delegate: Box<dyn CacheStore>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl StatsLayer {
    pub fn new(delegate: Box<dyn CacheStore>, hits: Arc<AtomicU64>, misses: Arc<AtomicU64>) -> Self {
        Self {
            delegate,
            hits,
            misses,
        }
    }
}

impl CacheStore for StatsLayer {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        let result = self.delegate.get(key)?;
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        tracing::debug!(
            cache_id = %self.delegate.id(),
            hits,
            misses,
            hit_ratio = if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            "cache lookup"
        );
        Ok(result)
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        self.delegate.put(key, value)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<()> {
        self.delegate.remove(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.delegate.clear()
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }

    fn shed(&mut self, budget: usize) -> usize {
        self.delegate.shed(budget)
    }
}
