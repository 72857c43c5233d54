//! SQLite connection implementation

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rowmap_core::{Connection, Result, RowmapError, StatementHandle};
use rusqlite::{Connection as RusqliteConnection, OpenFlags};

use crate::statement::SqliteStatement;

/// SQLite connection wrapper.
///
/// The underlying rusqlite connection sits behind a mutex so statement
/// handles and transactions can share it across threads.
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
}

impl SqliteConnection {
    /// Open a SQLite database file, creating it if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening SQLite database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(RowmapError::Connection(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
            RowmapError::Connection(format!(
                "Failed to open SQLite database at '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_rusqlite(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        tracing::debug!("opening in-memory SQLite database");
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            RowmapError::Connection(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::from_rusqlite(conn)
    }

    fn from_rusqlite(conn: RusqliteConnection) -> Result<Self> {
        // PRAGMA commands return results, so use pragma_update.
        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            RowmapError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| RowmapError::Connection(format!("Failed to set journal mode: {}", e)))?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
            RowmapError::Connection(format!("Failed to set synchronous mode: {}", e))
        })?;

        tracing::debug!("SQLite connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn raw(&self) -> &Arc<Mutex<RusqliteConnection>> {
        &self.conn
    }
}

impl Connection for SqliteConnection {
    fn prepare(&self, sql: &str, timeout: Option<Duration>) -> Result<Box<dyn StatementHandle>> {
        tracing::trace!(sql_preview = %sql.chars().take(100).collect::<String>(), "preparing SQLite statement");
        {
            // Validate the SQL up front and warm rusqlite's statement cache;
            // a handle for a broken statement should fail here, not at its
            // first execution.
            let conn = self.conn.lock();
            conn.prepare_cached(sql).map_err(|e| {
                RowmapError::Statement(format!("Failed to prepare statement: {}", e))
            })?;
        }
        Ok(Box::new(SqliteStatement::new(
            Arc::clone(&self.conn),
            sql,
            timeout,
        )))
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}
