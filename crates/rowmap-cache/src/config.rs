use std::collections::BTreeMap;
use std::time::Duration;

use rowmap_core::Result;
use serde::{Deserialize, Serialize};

use crate::builder::CacheBuilder;
use crate::shared::SharedCache;

/// Entry bound applied by eviction decorators when the configuration or
/// property bag does not override it.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Hot-ring size used by [`EvictionPolicy::TwoTier`] unless overridden
/// through the property bag.
pub const DEFAULT_HOT_SIZE: usize = 256;

/// Wait bound for blocking caches before a lookup gives up on an
/// in-flight population.
pub const DEFAULT_BLOCKING_TIMEOUT_MS: u64 = 5_000;

/// Eviction decorators that can participate in a cache chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Size-bounded, discards the least recently touched entry.
    Lru,
    /// Size-bounded, discards in strict arrival order.
    Fifo,
    /// Unbounded until asked to shed; protects a small ring of recently
    /// hit entries and discards cold arrivals first.
    TwoTier,
}

/// Declarative description of a shared cache chain.
///
/// The field order mirrors the order the layers are applied in:
/// base store, eviction decorators, interval flush, isolation, and
/// finally the always-present stats and synchronization layers with the
/// optional blocking layer outermost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Registry id of the base store constructor.
    pub store: String,
    /// Eviction decorators, applied in declared order.
    pub eviction: Vec<EvictionPolicy>,
    /// Entry bound handed to each eviction decorator.
    pub capacity: usize,
    /// If set and greater than zero, the whole chain is cleared once this
    /// many milliseconds have passed since the last clear.
    pub flush_interval_ms: Option<u64>,
    /// Store deep copies and hand out deep copies, so callers can mutate
    /// what they pass in or get back without corrupting the cache.
    pub isolated: bool,
    /// Allow at most one in-flight population per key across sessions.
    pub blocking: bool,
    /// How long a blocked lookup waits before failing.
    pub blocking_timeout_ms: u64,
    /// Free-form settings forwarded to the eviction decorators.
    /// Recognized keys: `capacity`, `hot_size`.
    pub properties: BTreeMap<String, String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: "memory".to_string(),
            eviction: vec![EvictionPolicy::Lru],
            capacity: DEFAULT_CAPACITY,
            flush_interval_ms: None,
            isolated: false,
            blocking: false,
            blocking_timeout_ms: DEFAULT_BLOCKING_TIMEOUT_MS,
            properties: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }

    pub fn with_eviction(mut self, eviction: Vec<EvictionPolicy>) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn with_isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_blocking_timeout(mut self, timeout: Duration) -> Self {
        self.blocking_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Builds a cache named `id` from this configuration using the default
    /// store registry.
    pub fn build(self, id: impl Into<String>) -> Result<SharedCache> {
        CacheBuilder::new(id).with_config(self).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_a_bounded_lru_chain() {
        let config = CacheConfig::default();
        assert_eq!(config.store, "memory");
        assert_eq!(config.eviction, vec![EvictionPolicy::Lru]);
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert!(!config.isolated);
        assert!(!config.blocking);
    }

    #[test]
    fn test_deserializes_with_partial_fields() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"eviction": ["fifo", "two_tier"], "blocking": true, "flush_interval_ms": 60000}"#,
        )
        .unwrap();
        assert_eq!(
            config.eviction,
            vec![EvictionPolicy::Fifo, EvictionPolicy::TwoTier]
        );
        assert!(config.blocking);
        assert_eq!(config.flush_interval_ms, Some(60_000));
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_builder_style_setters() {
        let config = CacheConfig::new()
            .with_eviction(vec![EvictionPolicy::TwoTier])
            .with_capacity(16)
            .with_flush_interval(Duration::from_secs(60))
            .with_isolated(true)
            .with_blocking(true)
            .with_blocking_timeout(Duration::from_millis(250))
            .with_property("hot_size", "4");
        assert_eq!(config.capacity, 16);
        assert_eq!(config.flush_interval_ms, Some(60_000));
        assert_eq!(config.blocking_timeout_ms, 250);
        assert_eq!(config.properties.get("hot_size").map(String::as_str), Some("4"));
    }
}
