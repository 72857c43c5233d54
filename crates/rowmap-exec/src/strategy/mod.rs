//! Statement-handle lifecycle strategies.
//!
//! All session behavior around caching, nesting, and deferred loads is
//! shared; strategies only decide how statement handles live. `Direct`
//! prepares and closes a handle per call, `Reuse` keeps handles open keyed
//! by SQL text, and `Batch` accumulates writes into ordered groups that
//! execute at flush.

mod batch;
mod direct;
mod reuse;

pub use batch::{BATCH_PENDING_ROWS, BatchStrategy};
pub use direct::DirectStrategy;
pub use reuse::ReuseStrategy;

use std::time::Duration;

use rowmap_core::{BatchResult, BoundQuery, Result, RowSource, StatementHandle, Transaction};

use crate::statement::StatementInfo;

/// Strategy-specific execution against the data source.
///
/// The session resolves the effective timeout (statement, then session
/// default, then transaction) before delegating.
pub trait ExecStrategy: Send {
    fn run_update(
        &mut self,
        tx: &mut dyn Transaction,
        statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<u64>;

    fn run_query(
        &mut self,
        tx: &mut dyn Transaction,
        statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn RowSource>>;

    /// Execute and return any accumulated batch groups, then release all
    /// held statement handles.
    fn flush(&mut self) -> Result<Vec<BatchResult>>;

    /// Release held handles and discard accumulated batch state without
    /// executing anything.
    fn release(&mut self);
}

/// Close a handle whose close failure should not mask the primary outcome.
pub(crate) fn close_quietly(handle: &mut dyn StatementHandle) {
    if let Err(err) = handle.close() {
        tracing::warn!(
            sql_preview = %handle.sql().chars().take(100).collect::<String>(),
            error = %err,
            "error closing statement handle"
        );
    }
}
