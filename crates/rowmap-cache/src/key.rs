//! Composite cache-key identity
//!
//! A `CacheKey` is an ordered fold of the elements that identify one
//! statement invocation: statement id, row bounds, resolved SQL, every bound
//! parameter value in declaration order, and the environment id. Equality
//! derives solely from the fold sequence, so two invocations hit the same
//! entry exactly when every folded element matches in the same order.

use std::hash::{Hash, Hasher};

use rowmap_core::Value;

const HASH_MULTIPLIER: u64 = 37;

#[derive(Debug, Clone)]
pub struct CacheKey {
    count: usize,
    checksum: u64,
    hash: u64,
    parts: Vec<Value>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            count: 0,
            checksum: 0,
            hash: 17,
            parts: Vec::new(),
        }
    }

    /// Fold one value into the running identity. Order is significant.
    pub fn update(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let element_hash = hash_value(&value);
        self.count += 1;
        self.checksum = self.checksum.wrapping_add(element_hash);
        self.hash = self
            .hash
            .wrapping_mul(HASH_MULTIPLIER)
            .wrapping_add(element_hash);
        self.parts.push(value);
    }

    /// Fold a slice of values in order
    pub fn update_all(&mut self, values: &[Value]) {
        for value in values {
            self.update(value.clone());
        }
    }

    /// Number of folded elements
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The running hash, stable across equal keys
    pub fn hash_code(&self) -> u64 {
        self.hash
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.checksum == other.checksum
            && self.count == other.count
            && self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
        state.write_u64(self.checksum);
        state.write_usize(self.count);
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}:{:x}:{}", self.hash, self.checksum, self.count)
    }
}

fn hash_value(value: &Value) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
