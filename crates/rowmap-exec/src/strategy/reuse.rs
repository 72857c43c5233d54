use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use rowmap_core::{BatchResult, BoundQuery, Result, RowSource, StatementHandle, Transaction};

use super::{ExecStrategy, close_quietly};
use crate::statement::StatementInfo;

/// Keeps prepared handles open, keyed by exact SQL text.
///
/// A repeated call with identical SQL reuses the existing handle after
/// re-applying the timeout and re-binding parameters. Flush and release
/// close everything; they run on commit, rollback, and close.
#[derive(Default)]
pub struct ReuseStrategy {
    handles: HashMap<String, Box<dyn StatementHandle>>,
}

impl ReuseStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles currently held open.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    fn handle_for(
        &mut self,
        tx: &mut dyn Transaction,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<&mut Box<dyn StatementHandle>> {
        match self.handles.entry(sql.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(
                    sql_preview = %sql.chars().take(100).collect::<String>(),
                    "reusing prepared statement handle"
                );
                let handle = entry.into_mut();
                handle.set_timeout(timeout)?;
                Ok(handle)
            }
            Entry::Vacant(slot) => {
                let connection = tx.connection()?;
                let handle = connection.prepare(sql, timeout)?;
                Ok(slot.insert(handle))
            }
        }
    }

    fn close_all(&mut self) {
        let count = self.handles.len();
        for (_, mut handle) in self.handles.drain() {
            close_quietly(handle.as_mut());
        }
        if count > 0 {
            tracing::debug!(handles = count, "closed reused statement handles");
        }
    }
}

impl ExecStrategy for ReuseStrategy {
    fn run_update(
        &mut self,
        tx: &mut dyn Transaction,
        _statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        let handle = self.handle_for(tx, &query.sql, timeout)?;
        handle.bind(&query.values)?;
        handle.execute_update()
    }

    fn run_query(
        &mut self,
        tx: &mut dyn Transaction,
        _statement: &StatementInfo,
        query: &BoundQuery,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn RowSource>> {
        let handle = self.handle_for(tx, &query.sql, timeout)?;
        handle.bind(&query.values)?;
        handle.execute_query()
    }

    fn flush(&mut self) -> Result<Vec<BatchResult>> {
        self.close_all();
        Ok(Vec::new())
    }

    fn release(&mut self) {
        self.close_all();
    }
}
