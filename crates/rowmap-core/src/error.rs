//! Error types for rowmap

use thiserror::Error;

use crate::statement::BatchResult;

/// Core error type for rowmap operations
#[derive(Error, Debug)]
pub enum RowmapError {
    /// A mutating call reached an executor that was already closed.
    #[error("Executor is closed")]
    Closed,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement error: {0}")]
    Statement(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A blocking-cache lock wait exceeded its bounded timeout.
    #[error("Cache lock wait timed out after {waited_ms} ms (key hash {key_hash:016x})")]
    CacheLockTimeout { waited_ms: u64, key_hash: u64 },

    /// Singleton extraction found more than one row.
    #[error("Expected at most one row, found {found}")]
    TooManyRows { found: usize },

    /// A query observed its own in-flight local-cache placeholder.
    #[error("Recursive execution detected for statement '{0}'")]
    RecursiveQuery(String),

    /// A deferred load referenced a key that was never populated.
    #[error(
        "Deferred load for property '{property}' references a result that was never produced"
    )]
    DeferredMiss { property: String },

    /// A batch flush failed partway through its groups.
    #[error("{0}")]
    Batch(Box<BatchFailure>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for rowmap operations
pub type Result<T> = std::result::Result<T, RowmapError>;

/// Details of a partially failed batch flush.
///
/// Groups before `index` executed successfully and carry their update counts
/// in `completed`; `failed` is the group whose batch execution raised the
/// underlying error (its counts were never populated); groups after `index`
/// were not executed at all. The caller must roll back the whole transaction,
/// completed groups included.
#[derive(Debug)]
pub struct BatchFailure {
    /// Results of the groups that executed before the failure, in order.
    pub completed: Vec<BatchResult>,
    /// The group whose batch execution failed.
    pub failed: BatchResult,
    /// Zero-based position of the failing group in flush order.
    pub index: usize,
    /// Underlying data-source error.
    pub cause: Box<RowmapError>,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch group {} (statement '{}') failed after {} completed group(s): {}",
            self.index,
            self.failed.statement_id,
            self.completed.len(),
            self.cause
        )
    }
}

impl From<BatchFailure> for RowmapError {
    fn from(failure: BatchFailure) -> Self {
        RowmapError::Batch(Box::new(failure))
    }
}
