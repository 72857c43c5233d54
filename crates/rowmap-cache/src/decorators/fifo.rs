//! Capacity-bounded insertion-order eviction

use std::collections::{HashSet, VecDeque};

use rowmap_core::Result;

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

/// Evicts strictly by arrival order once size exceeds capacity, regardless
/// of access pattern.
pub struct FifoPolicy {
    delegate: Box<dyn CacheStore>,
    capacity: usize,
    order: VecDeque<CacheKey>,
    members: HashSet<CacheKey>,
}

impl FifoPolicy {
    pub fn new(delegate: Box<dyn CacheStore>, capacity: usize) -> Self {
        Self {
            delegate,
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }
}

impl CacheStore for FifoPolicy {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        self.delegate.get(key)
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        if self.members.insert(key.clone()) {
            self.order.push_back(key.clone());
        }
        self.delegate.put(key, value)?;
        while self.order.len() > self.capacity {
            if let Some(victim) = self.order.pop_front() {
                tracing::trace!(cache_id = %self.delegate.id(), key = %victim, "evicting oldest entry");
                self.members.remove(&victim);
                self.delegate.remove(&victim)?;
            }
        }
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<()> {
        if self.members.remove(key) {
            self.order.retain(|k| k != key);
        }
        self.delegate.remove(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.order.clear();
        self.members.clear();
        self.delegate.clear()
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }

    fn shed(&mut self, budget: usize) -> usize {
        self.delegate.shed(budget)
    }
}
