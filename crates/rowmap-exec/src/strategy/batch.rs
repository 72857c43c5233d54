use std::time::Duration;

use rowmap_core::{
    BatchFailure, BatchResult, BoundQuery, Result, RowSource, StatementHandle, Transaction,
};

use super::{ExecStrategy, close_quietly};
use crate::statement::StatementInfo;

/// Row count reported by updates executed in batch mode. Nothing has run
/// yet; real counts arrive with the [`BatchResult`]s at flush.
pub const BATCH_PENDING_ROWS: u64 = u64::MAX;

/// Accumulates writes into ordered batch groups.
///
/// A call extends the current group only when both its SQL text and its
/// statement id match the previous call; anything else starts a new group
/// with its own handle. Queries force an early flush first, so reads always
/// observe the accumulated writes.
#[derive(Default)]
pub struct BatchStrategy {
    current_sql: Option<String>,
    current_statement: Option<String>,
    handles: Vec<Box<dyn StatementHandle>>,
    results: Vec<BatchResult>,
}

impl BatchStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batch groups accumulated and not yet flushed.
    pub fn pending_groups(&self) -> usize {
        self.results.len()
    }

    fn extends_current_group(&self, statement: &StatementInfo, sql: &str) -> bool {
        self.current_sql.as_deref() == Some(sql)
            && self.current_statement.as_deref() == Some(statement.id.as_str())
    }
}

impl ExecStrategy for BatchStrategy {
    fn run_update(
        &mut self,
        tx: &mut dyn Transaction,
        statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        if self.extends_current_group(statement, &query.sql) {
            if let (Some(handle), Some(result)) = (self.handles.last_mut(), self.results.last_mut())
            {
                handle.set_timeout(timeout)?;
                handle.bind(&query.values)?;
                handle.append_batch()?;
                result.param_sets.push(query.values.clone());
                return Ok(BATCH_PENDING_ROWS);
            }
        }

        let connection = tx.connection()?;
        let mut handle = connection.prepare(&query.sql, timeout)?;
        handle.bind(&query.values)?;
        handle.append_batch()?;
        let mut result = BatchResult::new(&statement.id, &query.sql);
        result.param_sets.push(query.values.clone());
        self.current_sql = Some(query.sql.clone());
        self.current_statement = Some(statement.id.clone());
        self.handles.push(handle);
        self.results.push(result);
        tracing::debug!(
            statement = %statement.id,
            group = self.results.len(),
            "started new batch group"
        );
        Ok(BATCH_PENDING_ROWS)
    }

    fn run_query(
        &mut self,
        tx: &mut dyn Transaction,
        _statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn RowSource>> {
        let flushed = self.flush()?;
        if !flushed.is_empty() {
            tracing::debug!(
                groups = flushed.len(),
                "executed pending batch groups before query"
            );
        }
        let connection = tx.connection()?;
        let mut handle = connection.prepare(&query.sql, timeout)?;
        let outcome = handle
            .bind(&query.values)
            .and_then(|_| handle.execute_query());
        close_quietly(handle.as_mut());
        outcome
    }

    /// Executes every accumulated group in order.
    ///
    /// On a group failure, the error carries the groups that already
    /// completed, the failing group, and its index; later groups are never
    /// executed. Handles are released either way.
    fn flush(&mut self) -> Result<Vec<BatchResult>> {
        self.current_sql = None;
        self.current_statement = None;
        let handles = std::mem::take(&mut self.handles);
        let results = std::mem::take(&mut self.results);
        let mut completed = Vec::with_capacity(results.len());
        let mut pairs = handles.into_iter().zip(results).enumerate();
        while let Some((index, (mut handle, mut result))) = pairs.next() {
            match handle.execute_batch() {
                Ok(counts) => {
                    tracing::debug!(
                        statement = %result.statement_id,
                        group = index,
                        sets = counts.len(),
                        "executed batch group"
                    );
                    result.update_counts = counts;
                    close_quietly(handle.as_mut());
                    completed.push(result);
                }
                Err(cause) => {
                    close_quietly(handle.as_mut());
                    for (_, (mut rest, _)) in pairs.by_ref() {
                        close_quietly(rest.as_mut());
                    }
                    tracing::warn!(
                        statement = %result.statement_id,
                        group = index,
                        completed = completed.len(),
                        "batch group failed; remaining groups discarded"
                    );
                    return Err(BatchFailure {
                        completed,
                        failed: result,
                        index,
                        cause: Box::new(cause),
                    }
                    .into());
                }
            }
        }
        Ok(completed)
    }

    fn release(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!(
                groups = self.handles.len(),
                "discarding batch groups without executing"
            );
        }
        for mut handle in self.handles.drain(..) {
            close_quietly(handle.as_mut());
        }
        self.results.clear();
        self.current_sql = None;
        self.current_statement = None;
    }
}
