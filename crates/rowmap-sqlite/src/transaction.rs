//! SQLite transaction implementation

use std::sync::Arc;
use std::time::Duration;

use rowmap_core::{Connection, Result, RowmapError, Transaction};

use crate::SqliteConnection;

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL so that it can
/// share the connection `Arc` without running into rusqlite's borrow-based
/// transaction lifetime requirements. The transaction begins lazily on the
/// first `connection` call; after a commit or rollback the next `connection`
/// call begins a fresh one, so a session can keep working across commits.
pub struct SqliteTransaction {
    database: Arc<SqliteConnection>,
    timeout: Option<Duration>,
    begun: bool,
    closed: bool,
}

impl SqliteTransaction {
    /// Create a transaction over an open database
    pub fn new(database: Arc<SqliteConnection>) -> Self {
        Self {
            database,
            timeout: None,
            begun: false,
            closed: false,
        }
    }

    /// Apply a statement timeout inherited by every statement this
    /// transaction prepares
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(RowmapError::Transaction(
                "transaction is closed".to_string(),
            ));
        }
        Ok(())
    }

    fn run(&self, sql: &str) -> Result<()> {
        let conn = self.database.raw();
        let conn = conn.lock();
        conn.execute_batch(sql)
            .map_err(|e| RowmapError::Transaction(format!("Failed to {}: {}", sql, e)))
    }
}

impl Transaction for SqliteTransaction {
    fn connection(&mut self) -> Result<Arc<dyn Connection>> {
        self.ensure_open()?;
        if !self.begun {
            // DEFERRED acquires the write lock on first write, which matches
            // the behaviour expected from a default transaction.
            self.run("BEGIN DEFERRED")?;
            self.begun = true;
            tracing::debug!("SQLite transaction started");
        }
        Ok(Arc::clone(&self.database) as Arc<dyn Connection>)
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.begun {
            tracing::trace!("commit with no active SQLite transaction");
            return Ok(());
        }
        self.run("COMMIT")?;
        self.begun = false;
        tracing::debug!("SQLite transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.begun {
            tracing::trace!("rollback with no active SQLite transaction");
            return Ok(());
        }
        self.run("ROLLBACK")?;
        self.begun = false;
        tracing::debug!("SQLite transaction rolled back");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.begun {
            if let Err(e) = self.run("ROLLBACK") {
                tracing::warn!(error = %e, "rollback while closing SQLite transaction failed");
            }
            self.begun = false;
        }
        self.closed = true;
        tracing::debug!("SQLite transaction closed");
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // An abandoned transaction would otherwise hold its write lock until
        // the connection goes away.
        if self.begun && !self.closed {
            tracing::warn!(
                "SQLite transaction dropped without commit or rollback, issuing automatic rollback"
            );
            if let Err(e) = self.run("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("begun", &self.begun)
            .field("closed", &self.closed)
            .field("timeout", &self.timeout)
            .finish()
    }
}
