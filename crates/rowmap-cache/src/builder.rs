//! Assembles a shared cache chain from declarative configuration.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use rowmap_core::{Result, RowmapError};

use crate::config::{CacheConfig, DEFAULT_HOT_SIZE, EvictionPolicy};
use crate::decorators::{
    FifoPolicy, IntervalFlush, LruPolicy, Serialized, StatsLayer, TwoTierPolicy,
};
use crate::registry::StoreRegistry;
use crate::shared::SharedCache;

/// Builds a [`SharedCache`] by wrapping a base store in the configured
/// decorators, innermost first:
///
/// 1. base store, constructed through the [`StoreRegistry`]
/// 2. eviction decorators, in declared order
/// 3. interval flush, when a positive interval is configured
/// 4. serialization, when isolation is requested
/// 5. stats, always
///
/// The synchronization lock and the optional blocking layer live in
/// [`SharedCache`] itself, outside the chain.
pub struct CacheBuilder {
    id: String,
    config: CacheConfig,
    registry: StoreRegistry,
}

impl CacheBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: CacheConfig::default(),
            registry: StoreRegistry::with_defaults(),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: StoreRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> Result<SharedCache> {
        let constructor = self.registry.get(&self.config.store).ok_or_else(|| {
            RowmapError::Configuration(format!(
                "cache '{}': unknown store '{}'",
                self.id, self.config.store
            ))
        })?;
        let mut store = constructor(&self.id);

        let capacity = self
            .usize_property("capacity")?
            .unwrap_or(self.config.capacity);
        let hot_size = self
            .usize_property("hot_size")?
            .unwrap_or(DEFAULT_HOT_SIZE);
        for policy in &self.config.eviction {
            store = match policy {
                EvictionPolicy::Lru => Box::new(LruPolicy::new(store, capacity)),
                EvictionPolicy::Fifo => Box::new(FifoPolicy::new(store, capacity)),
                EvictionPolicy::TwoTier => Box::new(TwoTierPolicy::new(store, hot_size)),
            };
        }

        if let Some(ms) = self.config.flush_interval_ms {
            if ms > 0 {
                store = Box::new(IntervalFlush::new(store, Duration::from_millis(ms)));
            }
        }

        if self.config.isolated {
            store = Box::new(Serialized::new(store));
        }

        let hits = Arc::new(AtomicU64::new(0));
        let misses = Arc::new(AtomicU64::new(0));
        store = Box::new(StatsLayer::new(store, hits.clone(), misses.clone()));

        let blocking_timeout = self
            .config
            .blocking
            .then(|| Duration::from_millis(self.config.blocking_timeout_ms));

        tracing::debug!(
            cache_id = %self.id,
            eviction = ?self.config.eviction,
            capacity,
            isolated = self.config.isolated,
            blocking = self.config.blocking,
            "built shared cache"
        );
        Ok(SharedCache::new(
            self.id,
            store,
            hits,
            misses,
            blocking_timeout,
        ))
    }

    fn usize_property(&self, name: &str) -> Result<Option<usize>> {
        match self.config.properties.get(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
                RowmapError::Configuration(format!(
                    "cache '{}': property '{}' must be a non-negative integer, got '{}'",
                    self.id, name, raw
                ))
            }),
        }
    }
}

impl std::fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish()
    }
}
