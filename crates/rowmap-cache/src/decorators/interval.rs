//! Interval flush

use std::time::{Duration, Instant};

use rowmap_core::Result;

use crate::key::CacheKey;
use crate::store::{CacheStore, StoredValue};

/// Clears the whole chain below it once the configured interval has elapsed.
///
/// The check runs before every operation; a `get` that triggers the flush
/// reports a miss for that one operation.
pub struct IntervalFlush {
    delegate: Box<dyn CacheStore>,
    interval: Duration,
    last_clear: Instant,
}

impl IntervalFlush {
    pub fn new(delegate: Box<dyn CacheStore>, interval: Duration) -> Self {
        Self {
            delegate,
            interval,
            last_clear: Instant::now(),
        }
    }

    fn flush_if_due(&mut self) -> Result<bool> {
        if self.last_clear.elapsed() >= self.interval {
            tracing::debug!(cache_id = %self.delegate.id(), "interval elapsed, flushing cache");
            self.delegate.clear()?;
            self.last_clear = Instant::now();
            return Ok(true);
        }
        Ok(false)
    }
}

impl CacheStore for IntervalFlush {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn get(&mut self, key: &CacheKey) -> Result<Option<StoredValue>> {
        if self.flush_if_due()? {
            return Ok(None);
        }
        self.delegate.get(key)
    }

    fn put(&mut self, key: CacheKey, value: StoredValue) -> Result<()> {
        self.flush_if_due()?;
        self.delegate.put(key, value)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<()> {
        self.flush_if_due()?;
        self.delegate.remove(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.last_clear = Instant::now();
        self.delegate.clear()
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }

    fn shed(&mut self, budget: usize) -> usize {
        self.delegate.shed(budget)
    }
}
