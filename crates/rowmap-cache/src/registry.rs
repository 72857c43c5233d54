//! Registry of base store constructors for cache configuration

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{CacheStore, MemoryStore};

/// Builds a base store for the cache with the given id.
pub type StoreConstructor = Arc<dyn Fn(&str) -> Box<dyn CacheStore> + Send + Sync>;

/// Registry mapping store names from [`CacheConfig`](crate::CacheConfig) to
/// the constructors that build them.
pub struct StoreRegistry {
    constructors: HashMap<String, StoreConstructor>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create a registry with all built-in stores registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", |id| Box::new(MemoryStore::new(id)));
        registry
    }

    /// Register a new store constructor
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: impl Fn(&str) -> Box<dyn CacheStore> + Send + Sync + 'static,
    ) {
        let name = name.into();
        tracing::debug!(store = %name, "registering cache store constructor");
        self.constructors.insert(name, Arc::new(constructor));
    }

    /// Get a constructor by name
    pub fn get(&self, name: &str) -> Option<StoreConstructor> {
        let constructor = self.constructors.get(name).cloned();
        if constructor.is_none() {
            tracing::warn!(store = %name, "store not found in registry");
        }
        constructor
    }

    /// Check if a store is registered
    pub fn has(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// List all registered store names
    pub fn list(&self) -> Vec<&str> {
        self.constructors.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.list())
            .finish()
    }
}
