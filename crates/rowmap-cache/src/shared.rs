//! Thread-safe wrapper around a decorator chain, shared across sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rowmap_core::{DataObject, Result, RowmapError};
use serde::Serialize;

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

/// Hit and miss counters observed since the cache was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Per-key reservations held by the session that last missed.
///
/// A reservation is taken on a miss and held until the owning thread
/// stores or removes the key. Other threads asking for the same key wait
/// instead of running the same query concurrently.
struct BlockingLocks {
    timeout: Duration,
    owners: Mutex<HashMap<CacheKey, ThreadId>>,
    available: Condvar,
}

impl BlockingLocks {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            owners: Mutex::new(HashMap::new()),
            available: Condvar::new(),
        }
    }

    fn acquire(&self, key: &CacheKey) -> Result<()> {
        let me = thread::current().id();
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut owners = self.owners.lock();
        loop {
            match owners.get(key) {
                None => {
                    owners.insert(key.clone(), me);
                    return Ok(());
                }
                Some(owner) if *owner == me => return Ok(()),
                Some(_) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited_ms = start.elapsed().as_millis() as u64;
                        tracing::warn!(
                            key_hash = key.hash_code(),
                            waited_ms,
                            "gave up waiting for in-flight cache population"
                        );
                        return Err(RowmapError::CacheLockTimeout {
                            waited_ms,
                            key_hash: key.hash_code(),
                        });
                    }
                    self.available.wait_for(&mut owners, deadline - now);
                }
            }
        }
    }

    fn release(&self, key: &CacheKey) {
        let mut owners = self.owners.lock();
        if owners.remove(key).is_some() {
            self.available.notify_all();
        }
    }
}

/// A named cache shared by every session that executes the statements
/// mapped to it.
///
/// The inner store is the decorator chain assembled by
/// [`CacheBuilder`](crate::CacheBuilder); this wrapper adds the mutex that
/// makes the chain safe to call from multiple threads, plus the optional
/// blocking layer that lets at most one session run the query for a
/// missing key at a time.
pub struct SharedCache {
    id: String,
    store: Mutex<Box<dyn CacheStore>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    blocking: Option<BlockingLocks>,
}

impl SharedCache {
    pub(crate) fn new(
        id: impl Into<String>,
        store: Box<dyn CacheStore>,
        hits: Arc<AtomicU64>,
        misses: Arc<AtomicU64>,
        blocking_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id: id.into(),
            store: Mutex::new(store),
            hits,
            misses,
            blocking: blocking_timeout.map(BlockingLocks::new),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking.is_some()
    }

    /// Looks up a key.
    ///
    /// When the blocking layer is active, a miss leaves the calling thread
    /// holding the reservation for `key`; it must follow up with
    /// [`put`](Self::put) or [`remove`](Self::remove) so waiting threads
    /// can make progress.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<DataObject>>> {
        if let Some(locks) = &self.blocking {
            locks.acquire(key)?;
        }
        let outcome = self.store.lock().get(key);
        match outcome {
            Ok(Some(stored)) => {
                if let Some(locks) = &self.blocking {
                    locks.release(key);
                }
                stored.into_rows().map(Some)
            }
            Ok(None) => Ok(None),
            Err(err) => {
                if let Some(locks) = &self.blocking {
                    locks.release(key);
                }
                Err(err)
            }
        }
    }

    pub fn put(&self, key: CacheKey, rows: Vec<DataObject>) -> Result<()> {
        let outcome = self.store.lock().put(key.clone(), StoredValue::Shared(rows));
        if let Some(locks) = &self.blocking {
            locks.release(&key);
        }
        outcome
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let outcome = self.store.lock().remove(key);
        if let Some(locks) = &self.blocking {
            locks.release(key);
        }
        outcome
    }

    pub fn clear(&self) -> Result<()> {
        tracing::debug!(cache_id = %self.id, "clearing shared cache");
        self.store.lock().clear()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Asks the chain to drop cold entries until at most `budget` remain.
    /// Returns the number of entries actually evicted.
    pub fn shed(&self, budget: usize) -> usize {
        self.store.lock().shed(budget)
    }
}

impl fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("id", &self.id)
            .field("blocking", &self.blocking.is_some())
            .finish()
    }
}
