//! SQLite statement handle implementation

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rowmap_core::{
    MaterializedRows, Result, Row, RowSource, RowmapError, StatementHandle, Value,
};
use rusqlite::{Connection as RusqliteConnection, params_from_iter};

use crate::values::{bind_values, column_value};

/// One logical prepared statement over the shared SQLite connection.
///
/// rusqlite's native prepared statements borrow the connection, so the handle
/// keeps the SQL text and re-enters rusqlite's prepared-statement cache on
/// each execution instead of holding a statement across calls. The cache
/// makes repeated executions of the same SQL skip re-compilation, which is
/// what handle reuse is after.
pub struct SqliteStatement {
    conn: Arc<Mutex<RusqliteConnection>>,
    sql: String,
    bound: Vec<Value>,
    batch: Vec<Vec<Value>>,
    timeout: Option<Duration>,
    closed: bool,
}

impl SqliteStatement {
    pub(crate) fn new(
        conn: Arc<Mutex<RusqliteConnection>>,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            bound: Vec::new(),
            batch: Vec::new(),
            timeout,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(RowmapError::Statement(
                "statement handle is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// SQLite has no per-statement execution deadline; the configured timeout
    /// bounds lock waits through the busy handler instead.
    fn apply_timeout(&self, conn: &RusqliteConnection) -> Result<()> {
        if let Some(timeout) = self.timeout {
            conn.busy_timeout(timeout)
                .map_err(|e| RowmapError::Statement(format!("Failed to set busy timeout: {}", e)))?;
        }
        Ok(())
    }
}

impl StatementHandle for SqliteStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, values: &[Value]) -> Result<()> {
        self.ensure_open()?;
        bind_values(values)?;
        self.bound = values.to_vec();
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        self.timeout = timeout;
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.ensure_open()?;
        tracing::debug!(sql_preview = %self.sql.chars().take(100).collect::<String>(), "executing SQLite update");

        let conn = self.conn.lock();
        self.apply_timeout(&conn)?;
        let params = bind_values(&self.bound)?;

        let mut stmt = conn
            .prepare_cached(&self.sql)
            .map_err(|e| RowmapError::Statement(format!("Failed to prepare statement: {}", e)))?;
        let affected = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(|e| RowmapError::Statement(format!("Failed to execute statement: {}", e)))?;

        tracing::debug!(affected_rows = affected, "SQLite update executed");
        Ok(affected as u64)
    }

    fn execute_query(&mut self) -> Result<Box<dyn RowSource>> {
        self.ensure_open()?;
        tracing::debug!(sql_preview = %self.sql.chars().take(100).collect::<String>(), "executing SQLite query");

        let conn = self.conn.lock();
        self.apply_timeout(&conn)?;
        let params = bind_values(&self.bound)?;

        let mut stmt = conn
            .prepare_cached(&self.sql)
            .map_err(|e| RowmapError::Statement(format!("Failed to prepare query: {}", e)))?;

        // Collect column names and declared types before executing; the
        // declared type from CREATE TABLE drives typed decoding.
        let mut columns: Vec<String> = Vec::with_capacity(stmt.column_count());
        let mut decl_types: Vec<Option<String>> = Vec::with_capacity(stmt.column_count());
        for col in stmt.columns() {
            columns.push(col.name().to_string());
            decl_types.push(col.decl_type().map(str::to_string));
        }

        let mut fetched = Vec::new();
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|e| RowmapError::Statement(format!("Failed to execute query: {}", e)))?;

        while let Some(row) = rows
            .next()
            .map_err(|e| RowmapError::Statement(format!("Failed to fetch row: {}", e)))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, decl) in decl_types.iter().enumerate() {
                let raw = row
                    .get_ref(idx)
                    .map_err(|e| RowmapError::Statement(format!("Failed to read column: {}", e)))?;
                values.push(column_value(decl.as_deref(), raw));
            }
            fetched.push(Row::new(columns.clone(), values));
        }

        tracing::debug!(row_count = fetched.len(), "SQLite query executed");
        Ok(Box::new(MaterializedRows::new(columns, fetched)))
    }

    fn append_batch(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.batch.push(std::mem::take(&mut self.bound));
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.ensure_open()?;
        let sets = std::mem::take(&mut self.batch);
        tracing::debug!(
            sql_preview = %self.sql.chars().take(100).collect::<String>(),
            set_count = sets.len(),
            "executing SQLite batch"
        );

        let conn = self.conn.lock();
        self.apply_timeout(&conn)?;
        let mut stmt = conn
            .prepare_cached(&self.sql)
            .map_err(|e| RowmapError::Statement(format!("Failed to prepare statement: {}", e)))?;

        let mut counts = Vec::with_capacity(sets.len());
        for (idx, set) in sets.iter().enumerate() {
            let params = bind_values(set)?;
            let affected = stmt.execute(params_from_iter(params.iter())).map_err(|e| {
                RowmapError::Statement(format!("Failed to execute batch set {}: {}", idx, e))
            })?;
            counts.push(affected as u64);
        }

        tracing::debug!(set_count = counts.len(), "SQLite batch executed");
        Ok(counts)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.bound.clear();
        self.batch.clear();
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("bound", &self.bound.len())
            .field("batch", &self.batch.len())
            .field("closed", &self.closed)
            .finish()
    }
}
