//! Capacity-bounded recency eviction

use std::collections::HashMap;

use rowmap_core::Result;

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

/// Evicts the least-recently-touched key once size exceeds capacity.
///
/// Every hit and every put refreshes the key's recency stamp, so a key that
/// keeps being read survives arbitrarily many inserts.
pub struct LruPolicy {
    delegate: Box<dyn CacheStore>,
    capacity: usize,
    stamps: HashMap<CacheKey, u64>,
    tick: u64,
}

impl LruPolicy {
    pub fn new(delegate: Box<dyn CacheStore>, capacity: usize) -> Self {
        Self {
            delegate,
            capacity: capacity.max(1),
            stamps: HashMap::new(),
            tick: 0,
        }
    }

    fn touch(&mut self, key: &CacheKey) {
        self.tick += 1;
        self.stamps.insert(key.clone(), self.tick);
    }

    fn evict_coldest(&mut self) -> Result<()> {
        let victim = self
            .stamps
            .iter()
            .min_by_key(|(_, stamp)| **stamp)
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            tracing::trace!(cache_id = %self.delegate.id(), key = %victim, "evicting least recently used entry");
            self.stamps.remove(&victim);
            self.delegate.remove(&victim)?;
        }
        Ok(())
    }
}

impl CacheStore for LruPolicy {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        let hit = self.delegate.get(key)?;
        if hit.is_some() {
            self.touch(key);
        }
        Ok(hit)
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        self.delegate.put(key.clone(), value)?;
        self.touch(&key);
        while self.stamps.len() > self.capacity {
            self.evict_coldest()?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<()> {
        self.stamps.remove(key);
        self.delegate.remove(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.stamps.clear();
        self.delegate.clear()
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }

    fn shed(&mut self, budget: usize) -> usize {
        self.delegate.shed(budget)
    }
}
