//! Scripted in-memory driver for exercising the execution machinery.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rowmap_core::{
    Connection, MaterializedRows, Result, Row, RowSource, RowmapError, StatementHandle,
    Transaction, Value,
};

use crate::config::SessionConfig;
use crate::executor::Executor;
use crate::mapper::RowMapper;

/// Scripted behavior plus a log of everything the engine did to the driver.
#[derive(Default)]
pub(crate) struct FakeState {
    /// Rows returned for a given SQL text.
    pub results: HashMap<String, Vec<Row>>,
    /// Update counts per SQL text; absent means 1.
    pub update_counts: HashMap<String, u64>,
    /// SQL texts whose execution fails.
    pub fail_sql: HashSet<String>,
    pub prepared: Vec<String>,
    /// Timeouts handed to prepare, in prepare order.
    pub prepare_timeouts: Vec<Option<Duration>>,
    /// Direct executions as (sql, bound values).
    pub executed: Vec<(String, Vec<Value>)>,
    /// Batch appends as (sql, bound values).
    pub batched: Vec<(String, Vec<Value>)>,
    /// SQL texts whose batches were executed, in execution order.
    pub batches_run: Vec<String>,
    /// Transaction lifecycle events: commit, rollback, close.
    pub events: Vec<String>,
    pub closed_handles: usize,
}

pub(crate) type SharedState = Arc<Mutex<FakeState>>;

pub(crate) fn fake_state() -> SharedState {
    Arc::new(Mutex::new(FakeState::default()))
}

pub(crate) fn script_rows(state: &SharedState, sql: &str, rows: Vec<Row>) {
    state.lock().results.insert(sql.to_string(), rows);
}

pub(crate) fn script_failure(state: &SharedState, sql: &str) {
    state.lock().fail_sql.insert(sql.to_string());
}

pub(crate) fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().map(|c| c.to_string()).collect(), values)
}

pub(crate) struct FakeConnection {
    state: SharedState,
}

impl Connection for FakeConnection {
    fn prepare(&self, sql: &str, timeout: Option<Duration>) -> Result<Box<dyn StatementHandle>> {
        {
            let mut state = self.state.lock();
            state.prepared.push(sql.to_string());
            state.prepare_timeouts.push(timeout);
        }
        Ok(Box::new(FakeHandle {
            sql: sql.to_string(),
            state: self.state.clone(),
            bound: Vec::new(),
            appended: 0,
        }))
    }
}

struct FakeHandle {
    sql: String,
    state: SharedState,
    bound: Vec<Value>,
    appended: usize,
}

impl FakeHandle {
    fn check_failure(&self) -> Result<()> {
        if self.state.lock().fail_sql.contains(&self.sql) {
            return Err(RowmapError::Statement(format!(
                "scripted failure for '{}'",
                self.sql
            )));
        }
        Ok(())
    }
}

impl StatementHandle for FakeHandle {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, values: &[Value]) -> Result<()> {
        self.bound = values.to_vec();
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.check_failure()?;
        let mut state = self.state.lock();
        state.executed.push((self.sql.clone(), self.bound.clone()));
        Ok(state.update_counts.get(&self.sql).copied().unwrap_or(1))
    }

    fn execute_query(&mut self) -> Result<Box<dyn RowSource>> {
        self.check_failure()?;
        let mut state = self.state.lock();
        state.executed.push((self.sql.clone(), self.bound.clone()));
        let rows = state.results.get(&self.sql).cloned().unwrap_or_default();
        let columns = rows
            .first()
            .map(|row| row.columns().to_vec())
            .unwrap_or_default();
        Ok(Box::new(MaterializedRows::new(columns, rows)))
    }

    fn append_batch(&mut self) -> Result<()> {
        self.appended += 1;
        self.state
            .lock()
            .batched
            .push((self.sql.clone(), self.bound.clone()));
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        // Record the attempt before failing so tests can tell "tried and
        // failed" apart from "never executed".
        self.state.lock().batches_run.push(self.sql.clone());
        self.check_failure()?;
        let count = self
            .state
            .lock()
            .update_counts
            .get(&self.sql)
            .copied()
            .unwrap_or(1);
        let counts = vec![count; self.appended];
        self.appended = 0;
        Ok(counts)
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().closed_handles += 1;
        Ok(())
    }
}

pub(crate) struct FakeTransaction {
    state: SharedState,
    timeout: Option<Duration>,
}

impl FakeTransaction {
    pub(crate) fn new(state: SharedState) -> Self {
        Self {
            state,
            timeout: None,
        }
    }

    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Transaction for FakeTransaction {
    fn connection(&mut self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(FakeConnection {
            state: self.state.clone(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.state.lock().events.push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.state.lock().events.push("rollback".to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().events.push("close".to_string());
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

pub(crate) fn fake_session(config: SessionConfig) -> (Executor, SharedState) {
    let state = fake_state();
    let tx = Box::new(FakeTransaction::new(state.clone()));
    (Executor::new(config, tx), state)
}

pub(crate) fn fake_session_with_mapper(
    config: SessionConfig,
    mapper: Arc<dyn RowMapper>,
) -> (Executor, SharedState) {
    let state = fake_state();
    let tx = Box::new(FakeTransaction::new(state.clone()));
    (Executor::with_mapper(config, tx, mapper), state)
}
