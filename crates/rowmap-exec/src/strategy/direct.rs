use std::time::Duration;

use rowmap_core::{BatchResult, BoundQuery, Result, RowSource, Transaction};

use super::{ExecStrategy, close_quietly};
use crate::statement::StatementInfo;

/// Prepares a fresh handle per call and closes it right after use.
#[derive(Debug, Default)]
pub struct DirectStrategy;

impl DirectStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl ExecStrategy for DirectStrategy {
    fn run_update(
        &mut self,
        tx: &mut dyn Transaction,
        _statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        let connection = tx.connection()?;
        let mut handle = connection.prepare(&query.sql, timeout)?;
        let outcome = handle
            .bind(&query.values)
            .and_then(|_| handle.execute_update());
        close_quietly(handle.as_mut());
        outcome
    }

    fn run_query(
        &mut self,
        tx: &mut dyn Transaction,
        _statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn RowSource>> {
        let connection = tx.connection()?;
        let mut handle = connection.prepare(&query.sql, timeout)?;
        let outcome = handle
            .bind(&query.values)
            .and_then(|_| handle.execute_query());
        close_quietly(handle.as_mut());
        outcome
    }

    fn flush(&mut self) -> Result<Vec<BatchResult>> {
        Ok(Vec::new())
    }

    fn release(&mut self) {}
}
