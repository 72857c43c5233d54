//! Cache store contract and the in-memory base store

use std::collections::HashMap;

use rowmap_core::{DataObject, Result, Value};

use crate::key::CacheKey;

/// What a store actually holds for one key.
///
/// `Shared` keeps live object handles (callers alias the cached objects);
/// `Bytes` is the serialized form written by the isolation decorator, which
/// deserializes back into fresh handles on every read.
#[derive(Debug, Clone)]
pub enum StoredValue {
    Shared(Vec<DataObject>),
    Bytes(Vec<u8>),
}

impl StoredValue {
    /// Materialize the stored rows as object handles
    pub fn into_rows(self) -> Result<Vec<DataObject>> {
        match self {
            StoredValue::Shared(rows) => Ok(rows),
            StoredValue::Bytes(bytes) => {
                let values: Vec<Value> = serde_json::from_slice(&bytes)?;
                Ok(values.into_iter().map(DataObject::new).collect())
            }
        }
    }
}

/// One layer of the shared-cache decorator chain.
///
/// Every decorator wraps a delegate store and must keep its own metadata
/// consistent with that delegate without assuming anything about the
/// neighboring layers. All methods take `&mut self`; the chain as a whole is
/// serialized behind the `SharedCache` lock.
pub trait CacheStore: Send {
    /// Identifier of the cache this store belongs to
    fn id(&self) -> &str;

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>>;

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()>;

    fn remove(&mut self, key: &CacheKey) -> Result<()>;

    /// Drop every entry (decorator metadata included)
    fn clear(&mut self) -> Result<()>;

    /// Number of entries currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Memory-pressure callback: discard evictable entries until the store
    /// holds at most `budget` entries. Returns how many were discarded.
    /// Layers without an eviction opinion delegate; the base store has
    /// nothing evictable of its own.
    fn shed(&mut self, budget: usize) -> usize {
        let _ = budget;
        0
    }
}

/// The default base store: a plain unsynchronized map
#[derive(Debug)]
pub struct MemoryStore {
    id: String,
    entries: HashMap<CacheKey, StoredValue>,
}

impl MemoryStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: HashMap::new(),
        }
    }
}

impl CacheStore for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
