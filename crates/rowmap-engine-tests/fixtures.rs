//! Shared fixtures for the engine integration suite.
//!
//! Every test here exercises the full stack: an executor session driving the
//! SQLite driver against a real database file seeded with a small
//! users/orders schema. Sessions open their own database connection, the way
//! independent units of work would in a host application, so tests can run
//! several sessions against one database and observe commit and rollback
//! visibility across them.

use std::path::PathBuf;
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use rowmap_core::{BoundQuery, Connection, Value};
use rowmap_exec::{ExecMode, Executor, RowMapper, SessionConfig, StatementInfo};
use rowmap_sqlite::{SqliteConnection, SqliteTransaction};
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Install the test log subscriber once per process. `RUST_LOG` controls
/// verbosity; the default only surfaces warnings.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
         id INTEGER PRIMARY KEY,
         name TEXT NOT NULL UNIQUE,
         active BOOLEAN NOT NULL DEFAULT 1,
         born DATE,
         settings JSON
     )",
    "CREATE TABLE orders (
         id INTEGER PRIMARY KEY,
         user_id INTEGER NOT NULL REFERENCES users(id),
         total REAL NOT NULL,
         placed_at DATETIME
     )",
];

const SEED: &[&str] = &[
    "INSERT INTO users (id, name, active, born, settings) VALUES
         (1, 'ada', 1, '1815-12-10', '{\"theme\": \"dark\"}'),
         (2, 'grace', 1, '1906-12-09', NULL),
         (3, 'edsger', 0, '1930-05-11', NULL)",
    "INSERT INTO orders (id, user_id, total, placed_at) VALUES
         (1, 1, 12.5, '2024-01-05 10:00:00'),
         (2, 1, 30.0, '2024-02-11 09:30:00'),
         (3, 2, 7.25, '2024-03-01 16:45:00')",
];

/// One seeded test database on disk.
///
/// File-backed rather than in-memory so several connections can see the same
/// data; the temporary directory is cleaned up when the fixture drops.
pub struct TestDb {
    path: PathBuf,
    _dir: TempDir,
}

impl TestDb {
    /// Create a database with the users/orders schema and seed rows
    pub fn create() -> Result<Self> {
        init_tracing();
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        let path = dir.path().join("rowmap-engine.db");
        let db = TestDb { path, _dir: dir };

        let conn = db.connect()?;
        for sql in SCHEMA.iter().chain(SEED) {
            run(&conn, sql)?;
        }
        Ok(db)
    }

    /// Open a fresh driver connection to this database
    pub fn connect(&self) -> Result<Arc<SqliteConnection>> {
        Ok(Arc::new(SqliteConnection::open(&self.path)?))
    }

    /// Open a session in the given execution mode
    pub fn session(&self, mode: ExecMode) -> Result<Executor> {
        self.session_with(SessionConfig::new().with_mode(mode))
    }

    /// Open a session with full control over its configuration
    pub fn session_with(&self, config: SessionConfig) -> Result<Executor> {
        let conn = self.connect()?;
        Ok(Executor::new(config, Box::new(SqliteTransaction::new(conn))))
    }

    /// Open a session that maps rows through a custom mapper
    pub fn session_with_mapper(
        &self,
        mode: ExecMode,
        mapper: Arc<dyn RowMapper>,
    ) -> Result<Executor> {
        let conn = self.connect()?;
        Ok(Executor::with_mapper(
            SessionConfig::new().with_mode(mode),
            Box::new(SqliteTransaction::new(conn)),
            mapper,
        ))
    }
}

fn run(conn: &Arc<SqliteConnection>, sql: &str) -> Result<()> {
    let mut stmt = conn.prepare(sql, None)?;
    stmt.execute_update()
        .with_context(|| format!("failed to run fixture statement: {sql}"))?;
    Ok(())
}

/// Select every user, ordered by id
pub fn select_all_users() -> (StatementInfo, BoundQuery) {
    (
        StatementInfo::select("user.select_all"),
        BoundQuery::new("SELECT id, name, active, born, settings FROM users ORDER BY id"),
    )
}

/// Select one user by primary key
pub fn select_user_by_id(id: i64) -> (StatementInfo, BoundQuery) {
    (
        StatementInfo::select("user.select_by_id"),
        BoundQuery::new("SELECT id, name, active FROM users WHERE id = ?1")
            .with_values(vec![Value::Int(id)]),
    )
}

/// Select the orders belonging to one user, ordered by id
pub fn select_orders_for_user(user_id: i64) -> (StatementInfo, BoundQuery) {
    (
        StatementInfo::select("order.select_for_user"),
        BoundQuery::new("SELECT id, total FROM orders WHERE user_id = ?1 ORDER BY id")
            .with_values(vec![Value::Int(user_id)]),
    )
}

/// Insert a minimal user row
pub fn insert_user(id: i64, name: &str) -> (StatementInfo, BoundQuery) {
    (
        StatementInfo::insert("user.insert"),
        BoundQuery::new("INSERT INTO users (id, name) VALUES (?1, ?2)")
            .with_values(vec![Value::Int(id), Value::String(name.to_string())]),
    )
}

/// Rename an existing user
pub fn rename_user(id: i64, name: &str) -> (StatementInfo, BoundQuery) {
    (
        StatementInfo::update("user.rename"),
        BoundQuery::new("UPDATE users SET name = ?2 WHERE id = ?1")
            .with_values(vec![Value::Int(id), Value::String(name.to_string())]),
    )
}

/// Count the user rows through the session under test
pub fn count_users(session: &mut Executor) -> Result<i64> {
    let statement = StatementInfo::select("user.count");
    let query = BoundQuery::new("SELECT COUNT(*) AS n FROM users");
    let row = session
        .select_one(&statement, query)?
        .context("count query produced no row")?;
    row.get("n")
        .and_then(|v| v.as_i64())
        .context("count column missing")
}
