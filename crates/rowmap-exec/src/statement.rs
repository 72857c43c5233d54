use std::sync::Arc;
use std::time::Duration;

use rowmap_cache::SharedCache;
use rowmap_core::StatementKind;

/// Execution metadata for a mapped statement: its identifier, kind, the
/// cache flags, and the shared cache it participates in, if any.
///
/// The `id` is the namespaced statement name (`user.select_by_id`); the
/// resolved SQL travels separately in a
/// [`BoundQuery`](rowmap_core::BoundQuery) because one statement can expand
/// to different SQL per invocation.
#[derive(Debug, Clone)]
pub struct StatementInfo {
    pub id: String,
    pub kind: StatementKind,
    pub timeout: Option<Duration>,
    /// Invalidate cached results before this statement runs. Defaults to
    /// false for selects and true for writes.
    pub flush_cache: bool,
    /// Store this statement's results in the shared cache. Only selects
    /// default to true.
    pub use_cache: bool,
    pub cache: Option<Arc<SharedCache>>,
}

impl StatementInfo {
    fn new(id: impl Into<String>, kind: StatementKind) -> Self {
        let flush_cache = !kind.is_select();
        Self {
            id: id.into(),
            kind,
            timeout: None,
            flush_cache,
            use_cache: kind.is_select(),
            cache: None,
        }
    }

    pub fn select(id: impl Into<String>) -> Self {
        Self::new(id, StatementKind::Select)
    }

    pub fn insert(id: impl Into<String>) -> Self {
        Self::new(id, StatementKind::Insert)
    }

    pub fn update(id: impl Into<String>) -> Self {
        Self::new(id, StatementKind::Update)
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self::new(id, StatementKind::Delete)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_flush_cache(mut self, flush_cache: bool) -> Self {
        self.flush_cache = flush_cache;
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_cache(mut self, cache: Arc<SharedCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}
