//! Driver-facing contracts: connections, statement handles, row sources
//!
//! The executor never talks to a database library directly; it prepares
//! statement handles through a `Connection` obtained from its `Transaction`
//! and drives them through the `StatementHandle` contract. Drivers implement
//! these traits (see the rowmap-sqlite crate for the reference
//! implementation).

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::Result;
use crate::types::{Row, Value};

/// Factory for statement handles over one underlying database connection
pub trait Connection: Send + Sync {
    /// Prepare a statement handle for the given SQL.
    ///
    /// The timeout, when present, bounds statement execution; how it is
    /// enforced is driver-specific.
    fn prepare(&self, sql: &str, timeout: Option<Duration>) -> Result<Box<dyn StatementHandle>>;
}

/// One prepared statement, reusable across bind/execute cycles
pub trait StatementHandle: Send {
    /// SQL text this handle was prepared with
    fn sql(&self) -> &str;

    /// Bind a fresh set of parameter values, replacing any previous binding
    fn bind(&mut self, values: &[Value]) -> Result<()>;

    /// Re-apply an execution timeout (used when a handle is reused)
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Execute as a write, returning the affected row count
    fn execute_update(&mut self) -> Result<u64>;

    /// Execute as a read, returning a row source
    fn execute_query(&mut self) -> Result<Box<dyn RowSource>>;

    /// Append the currently bound parameters to the handle's batch
    fn append_batch(&mut self) -> Result<()>;

    /// Execute the accumulated batch, returning one update count per
    /// appended parameter set, in append order
    fn execute_batch(&mut self) -> Result<Vec<u64>>;

    /// Release the handle
    fn close(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn StatementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementHandle")
            .field("sql", &self.sql())
            .finish_non_exhaustive()
    }
}

/// Forward-only stream of result rows
pub trait RowSource: Send {
    /// Result column names, in select order
    fn columns(&self) -> &[String];

    /// Fetch the next row, or `None` when exhausted
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// A row source over rows already fetched into memory.
///
/// Drivers whose native row streams borrow the statement (rusqlite among
/// them) drain into this; it also backs the in-memory test drivers.
#[derive(Debug, Default)]
pub struct MaterializedRows {
    columns: Vec<String>,
    rows: VecDeque<Row>,
}

impl MaterializedRows {
    /// Build a source from pre-fetched rows
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// Rows remaining to be read
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowSource for MaterializedRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}
