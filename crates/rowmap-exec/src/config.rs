use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a session manages statement handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Prepare a fresh handle per call and close it right after use.
    #[default]
    Direct,
    /// Keep handles open and reuse them for identical SQL text.
    Reuse,
    /// Accumulate writes into batch groups and execute them at flush.
    Batch,
}

/// How long entries live in the session-local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalCacheScope {
    /// Entries survive until a write, commit, rollback, or close.
    #[default]
    Session,
    /// Entries are dropped after every top-level query.
    Statement,
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Environment identifier folded into every cache key, so sessions
    /// against different environments never share results.
    pub environment: String,
    pub mode: ExecMode,
    pub local_scope: LocalCacheScope,
    /// Master switch for the shared caches; statements keep their cache
    /// references but the session ignores them when this is off.
    pub shared_cache_enabled: bool,
    /// Fallback statement timeout when neither the statement nor the
    /// transaction carries one.
    pub default_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            environment: "default".to_string(),
            mode: ExecMode::Direct,
            local_scope: LocalCacheScope::Session,
            shared_cache_enabled: true,
            default_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_local_scope(mut self, scope: LocalCacheScope) -> Self {
        self.local_scope = scope;
        self
    }

    pub fn with_shared_cache_enabled(mut self, enabled: bool) -> Self {
        self.shared_cache_enabled = enabled;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}
