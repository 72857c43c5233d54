//! Statement vocabulary shared between the executor and drivers

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// SQL command classification for a mapped statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    /// Whether statements of this kind read rather than write
    pub fn is_select(&self) -> bool {
        matches!(self, StatementKind::Select)
    }
}

/// A fully resolved SQL string plus its bound parameter values, in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

impl BoundQuery {
    /// Create a bound query with no parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    /// Attach parameter values
    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }
}

/// Offset/limit window applied while mapping result rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBounds {
    /// Number of leading rows to skip
    pub offset: usize,
    /// Maximum number of rows to map
    pub limit: usize,
}

impl RowBounds {
    /// Window over a result set
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Whether this is the unbounded default window
    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit == usize::MAX
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// Accumulated identity and outcome of one batch group.
///
/// A group collects consecutive calls sharing the same SQL text and
/// statement identifier; `param_sets` grows by one entry per call and
/// `update_counts` stays empty until the group's batch executes at flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Identifier of the mapped statement this group belongs to
    pub statement_id: String,
    /// Exact SQL text shared by every call in the group
    pub sql: String,
    /// One bound parameter set per accumulated call, in call order
    pub param_sets: Vec<Vec<Value>>,
    /// Per-call update counts, populated at flush
    pub update_counts: Vec<u64>,
}

impl BatchResult {
    /// Start an empty group for a statement
    pub fn new(statement_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            sql: sql.into(),
            param_sets: Vec::new(),
            update_counts: Vec::new(),
        }
    }

    /// Number of calls accumulated in this group
    pub fn len(&self) -> usize {
        self.param_sets.len()
    }

    /// Whether the group has accumulated any calls
    pub fn is_empty(&self) -> bool {
        self.param_sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_query_builder() {
        let bound = BoundQuery::new("SELECT * FROM users WHERE id = ?")
            .with_values(vec![Value::Int(42)]);
        assert_eq!(bound.sql, "SELECT * FROM users WHERE id = ?");
        assert_eq!(bound.values, vec![Value::Int(42)]);
    }

    #[test]
    fn test_row_bounds_default_is_unbounded() {
        let bounds = RowBounds::default();
        assert!(bounds.is_unbounded());
        assert!(!RowBounds::new(5, 10).is_unbounded());
    }

    #[test]
    fn test_batch_result_accumulation() {
        let mut group = BatchResult::new("user.insert", "INSERT INTO users VALUES (?)");
        assert!(group.is_empty());
        group.param_sets.push(vec![Value::Int(1)]);
        group.param_sets.push(vec![Value::Int(2)]);
        assert_eq!(group.len(), 2);
        assert!(group.update_counts.is_empty());
    }
}
