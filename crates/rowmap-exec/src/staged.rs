//! Transactional staging in front of the shared caches.
//!
//! Results produced inside an uncommitted transaction must not become
//! visible to other sessions, so every shared-cache write a session makes
//! is staged here and only published once the transaction commits. Clears
//! requested by statements with `flush_cache` are staged the same way.
//! Reads go straight through to the shared cache, with every miss recorded
//! so blocking reservations can be released if the session never produces
//! a value for that key.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rowmap_cache::{CacheKey, SharedCache};
use rowmap_core::{DataObject, Result};

/// One session's staged view of one shared cache.
#[derive(Debug)]
pub(crate) struct StagedView {
    cache: Arc<SharedCache>,
    pending: HashMap<CacheKey, Vec<DataObject>>,
    missed: HashSet<CacheKey>,
    clear_pending: bool,
}

impl StagedView {
    fn new(cache: Arc<SharedCache>) -> Self {
        Self {
            cache,
            pending: HashMap::new(),
            missed: HashSet::new(),
            clear_pending: false,
        }
    }

    /// Read through to the shared cache. Once a clear is staged, published
    /// entries are dead to this session even though other sessions still
    /// see them, so everything reports as a miss.
    fn get(&mut self, key: &CacheKey) -> Result<Option<Vec<DataObject>>> {
        let rows = self.cache.get(key)?;
        if rows.is_none() {
            self.missed.insert(key.clone());
        }
        if self.clear_pending {
            return Ok(None);
        }
        Ok(rows)
    }

    fn put(&mut self, key: CacheKey, rows: Vec<DataObject>) {
        self.pending.insert(key, rows);
    }

    fn clear(&mut self) {
        self.clear_pending = true;
        self.pending.clear();
    }

    fn commit(&mut self) -> Result<()> {
        if self.clear_pending {
            self.cache.clear()?;
        }
        for (key, rows) in self.pending.drain() {
            self.missed.remove(&key);
            self.cache.put(key, rows)?;
        }
        // Keys this session missed but never populated would otherwise pin
        // their blocking reservations forever.
        for key in self.missed.drain() {
            self.cache.remove(&key)?;
        }
        self.clear_pending = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        for key in self.missed.drain() {
            self.cache.remove(&key)?;
        }
        self.clear_pending = false;
        Ok(())
    }
}

/// All staged views owned by one session, keyed by cache id.
#[derive(Debug, Default)]
pub(crate) struct StagedCaches {
    views: HashMap<String, StagedView>,
}

impl StagedCaches {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn view(&mut self, cache: &Arc<SharedCache>) -> &mut StagedView {
        self.views
            .entry(cache.id().to_string())
            .or_insert_with(|| StagedView::new(cache.clone()))
    }

    pub(crate) fn get(
        &mut self,
        cache: &Arc<SharedCache>,
        key: &CacheKey,
    ) -> Result<Option<Vec<DataObject>>> {
        self.view(cache).get(key)
    }

    pub(crate) fn put(&mut self, cache: &Arc<SharedCache>, key: CacheKey, rows: Vec<DataObject>) {
        self.view(cache).put(key, rows);
    }

    pub(crate) fn clear(&mut self, cache: &Arc<SharedCache>) {
        tracing::debug!(cache_id = %cache.id(), "staging shared cache clear");
        self.view(cache).clear();
    }

    /// Publish every staged view. Called after the transaction committed.
    pub(crate) fn commit_all(&mut self) -> Result<()> {
        for view in self.views.values_mut() {
            view.commit()?;
        }
        Ok(())
    }

    /// Discard staged state. Failures here are logged, not raised; rollback
    /// must run to completion for every view.
    pub(crate) fn rollback_all(&mut self) {
        for (id, view) in self.views.iter_mut() {
            if let Err(err) = view.rollback() {
                tracing::warn!(cache_id = %id, error = %err, "error discarding staged cache state");
            }
        }
    }
}
