//! Two-tier memory-pressure eviction
//!
//! Replacement for reclaimable-reference ("weak") caching: a bounded hot
//! ring of the most recently accessed keys is hard-protected, and everything
//! else forms a cold tier the host can discard on demand through `shed`.
//! Cold-tier eviction never happens spontaneously; its timing is the host's
//! business, not part of the cache contract.

use std::collections::VecDeque;

use rowmap_core::Result;

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

pub struct TwoTierPolicy {
    delegate: Box<dyn CacheStore>,
    hot_size: usize,
    hot: VecDeque<CacheKey>,
    arrivals: VecDeque<CacheKey>,
}

impl TwoTierPolicy {
    pub fn new(delegate: Box<dyn CacheStore>, hot_size: usize) -> Self {
        Self {
            delegate,
            hot_size: hot_size.max(1),
            hot: VecDeque::new(),
            arrivals: VecDeque::new(),
        }
    }

    fn protect(&mut self, key: &CacheKey) {
        self.hot.retain(|k| k != key);
        self.hot.push_back(key.clone());
        while self.hot.len() > self.hot_size {
            self.hot.pop_front();
        }
    }

    /// Keys currently protected by the hot ring, oldest first
    pub fn protected(&self) -> impl Iterator<Item = &CacheKey> {
        self.hot.iter()
    }
}

impl CacheStore for TwoTierPolicy {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        let hit = self.delegate.get(key)?;
        if hit.is_some() {
            self.protect(key);
        }
        Ok(hit)
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        if !self.arrivals.contains(&key) {
            self.arrivals.push_back(key.clone());
        }
        self.delegate.put(key, value)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<()> {
        self.hot.retain(|k| k != key);
        self.arrivals.retain(|k| k != key);
        self.delegate.remove(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.hot.clear();
        self.arrivals.clear();
        self.delegate.clear()
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }

    fn shed(&mut self, budget: usize) -> usize {
        let mut evicted = 0;
        let mut scanned = 0;
        let max_scan = self.arrivals.len();
        while self.delegate.len() > budget && scanned < max_scan {
            scanned += 1;
            let Some(key) = self.arrivals.pop_front() else {
                break;
            };
            if self.hot.contains(&key) {
                self.arrivals.push_back(key);
                continue;
            }
            let before = self.delegate.len();
            if self.delegate.remove(&key).is_ok() && self.delegate.len() < before {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::debug!(
                cache_id = %self.delegate.id(),
                evicted,
                remaining = self.delegate.len(),
                "cold tier shed under memory pressure"
            );
        }
        evicted
    }
}
