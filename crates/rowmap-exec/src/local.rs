//! Session-local result cache with the placeholder protocol.

use std::collections::HashMap;

use rowmap_cache::CacheKey;
use rowmap_core::DataObject;

/// State of one local cache slot.
///
/// Absent keys simply have no entry. `Pending` is the placeholder inserted
/// before a query runs against the data source; it must never escape to a
/// caller as a result, and a query observing its own `Pending` entry is
/// re-entering itself.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Pending,
    Ready(Vec<DataObject>),
}

/// Per-session map from cache key to query result.
///
/// Not shared and not synchronized; the owning session is single-threaded
/// by contract. Writers must follow the placeholder protocol: `put_pending`
/// before hitting the data source, then either `put_ready` on success or
/// `remove` on failure, never leaving a `Pending` entry behind.
#[derive(Debug, Default)]
pub struct LocalCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// True when the key has any entry, including an in-flight placeholder.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// True only when a finished result is present.
    pub fn is_ready(&self, key: &CacheKey) -> bool {
        matches!(self.entries.get(key), Some(CacheEntry::Ready(_)))
    }

    pub fn put_pending(&mut self, key: CacheKey) {
        self.entries.insert(key, CacheEntry::Pending);
    }

    pub fn put_ready(&mut self, key: &CacheKey, rows: Vec<DataObject>) {
        self.entries.insert(key.clone(), CacheEntry::Ready(rows));
    }

    pub fn remove(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::trace!(entries = self.entries.len(), "clearing local cache");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::Value;

    fn key(n: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(Value::Int(n));
        key
    }

    #[test]
    fn test_placeholder_lifecycle() {
        let mut cache = LocalCache::new();
        assert!(!cache.contains(&key(1)));

        cache.put_pending(key(1));
        assert!(cache.contains(&key(1)));
        assert!(!cache.is_ready(&key(1)));
        assert_eq!(cache.lookup(&key(1)), Some(&CacheEntry::Pending));

        let rows = vec![DataObject::new(Value::Int(42))];
        cache.put_ready(&key(1), rows.clone());
        assert!(cache.is_ready(&key(1)));
        assert_eq!(cache.lookup(&key(1)), Some(&CacheEntry::Ready(rows)));
    }

    #[test]
    fn test_failed_execution_reverts_to_absent() {
        let mut cache = LocalCache::new();
        cache.put_pending(key(1));
        cache.remove(&key(1));
        assert!(!cache.contains(&key(1)));
        assert_eq!(cache.lookup(&key(1)), None);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = LocalCache::new();
        cache.put_pending(key(1));
        cache.put_ready(&key(2), vec![]);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
