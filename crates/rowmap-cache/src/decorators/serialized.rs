//! Read/write isolation through serialization

use rowmap_core::{DataObject, Result, Value};

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

/// Stores a deep, independent copy of every entry and returns freshly
/// deserialized objects on every read, so external mutation of an input or
/// output object never corrupts the cached entry. Serialization failures
/// propagate; a cache must never fall back to returning aliased data.
pub struct Serialized {
    delegate: Box<dyn CacheStore>,
}

impl Serialized {
    pub fn new(delegate: Box<dyn CacheStore>) -> Self {
        Self { delegate }
    }
}

impl CacheStore for Serialized {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        match self.delegate.get(key)? {
            Some(StoredValue::Bytes(bytes)) => {
                let values: Vec<Value> = serde_json::from_slice(&bytes)?;
                Ok(Some(StoredValue::Shared(
                    values.into_iter().map(DataObject::new).collect(),
                )))
            }
            other => Ok(other),
        }
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        let stored = match value {
            StoredValue::Shared(rows) => {
                let snapshots: Vec<Value> = rows.iter().map(|row| row.snapshot()).collect();
                StoredValue::Bytes(serde_json::to_vec(&snapshots)?)
            }
            bytes @ StoredValue::Bytes(_) => bytes,
        };
        self.delegate.put(key, stored)
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
