//! Shared cache tests
//!
//! Exercises the transactional staging layer across real sessions: entries
//! publish on commit and vanish on rollback, writes clear shared state at
//! commit, and blocking caches hold concurrent readers until the first
//! loader publishes or releases its reservation.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rowmap_cache::{CacheBuilder, CacheConfig, SharedCache};
use rowmap_core::{Connection, RowBounds, RowmapError};
use rowmap_exec::{ExecMode, SessionConfig};

use crate::fixtures::{TestDb, insert_user, select_all_users};

fn user_cache() -> Result<Arc<SharedCache>> {
    Ok(Arc::new(CacheBuilder::new("user").build()?))
}

fn blocking_user_cache(timeout: Duration) -> Result<Arc<SharedCache>> {
    let config = CacheConfig::new()
        .with_blocking(true)
        .with_blocking_timeout(timeout);
    Ok(Arc::new(CacheBuilder::new("user").with_config(config).build()?))
}

/// Test that staged entries are invisible until commit and served from the
/// cache afterwards
#[test]
fn test_staged_entries_publish_on_commit() -> Result<()> {
    let db = TestDb::create()?;
    let cache = user_cache()?;

    let mut writer = db.session(ExecMode::Direct)?;
    let (statement, query) = select_all_users();
    let statement = statement.with_cache(Arc::clone(&cache));
    let rows = writer.query(&statement, query.clone(), RowBounds::default())?;
    assert_eq!(rows.len(), 3);
    assert_eq!(cache.len(), 0, "entries must stay staged until commit");

    writer.commit(false)?;
    assert_eq!(cache.len(), 1);

    // Empty the tables behind the cache's back; a later hit must come from
    // the cache, not the database.
    let raw = db.connect()?;
    for sql in ["DELETE FROM orders", "DELETE FROM users"] {
        let mut stmt = raw.prepare(sql, None)?;
        stmt.execute_update()?;
    }

    let mut reader = db.session(ExecMode::Direct)?;
    let cached = reader.query(&statement, query, RowBounds::default())?;
    assert_eq!(cached.len(), 3, "rows should be served from the shared cache");
    assert!(cache.stats().hits >= 1);
    Ok(())
}

/// Test that rollback discards staged entries
#[test]
fn test_rollback_discards_staged_entries() -> Result<()> {
    let db = TestDb::create()?;
    let cache = user_cache()?;

    let mut session = db.session(ExecMode::Direct)?;
    let (statement, query) = select_all_users();
    let statement = statement.with_cache(Arc::clone(&cache));
    session.query(&statement, query, RowBounds::default())?;
    session.rollback(false)?;

    assert!(cache.is_empty());
    Ok(())
}

/// Test that a committed write clears the shared cache it flushes
#[test]
fn test_writes_clear_shared_entries_at_commit() -> Result<()> {
    let db = TestDb::create()?;
    let cache = user_cache()?;

    let mut reader = db.session(ExecMode::Direct)?;
    let (statement, query) = select_all_users();
    let select = statement.with_cache(Arc::clone(&cache));
    reader.query(&select, query, RowBounds::default())?;
    reader.commit(false)?;
    assert_eq!(cache.len(), 1);

    let mut writer = db.session(ExecMode::Direct)?;
    let (statement, query) = insert_user(4, "barbara");
    let insert = statement.with_cache(Arc::clone(&cache));
    writer.update(&insert, &query)?;
    assert_eq!(cache.len(), 1, "the staged clear must wait for commit");

    writer.commit(true)?;
    assert!(cache.is_empty(), "commit should apply the staged clear");
    Ok(())
}

/// Test that a session with shared caching disabled ignores statement caches
#[test]
fn test_disabled_sessions_ignore_statement_caches() -> Result<()> {
    let db = TestDb::create()?;
    let cache = user_cache()?;

    let config = SessionConfig::new().with_shared_cache_enabled(false);
    let mut session = db.session_with(config)?;
    let (statement, query) = select_all_users();
    let statement = statement.with_cache(Arc::clone(&cache));
    session.query(&statement, query, RowBounds::default())?;
    session.commit(false)?;

    assert!(cache.is_empty());
    Ok(())
}

/// Test that a blocking cache holds a second reader until the first loader
/// publishes
#[test]
fn test_blocking_readers_wait_for_the_first_loader() -> Result<()> {
    let db = TestDb::create()?;
    let cache = blocking_user_cache(Duration::from_millis(50))?;

    let mut loader = db.session(ExecMode::Direct)?;
    let (statement, query) = select_all_users();
    let statement = statement.with_cache(Arc::clone(&cache));
    loader.query(&statement, query.clone(), RowBounds::default())?;

    // The loader holds the key's reservation until it commits or rolls
    // back, so a second session times out instead of loading twice.
    let mut blocked = db.session(ExecMode::Direct)?;
    let blocked_statement = statement.clone();
    let blocked_query = query.clone();
    let outcome = thread::spawn(move || {
        blocked.query(&blocked_statement, blocked_query, RowBounds::default())
    })
    .join()
    .expect("blocked session panicked");
    assert!(matches!(
        outcome,
        Err(RowmapError::CacheLockTimeout { .. })
    ));

    loader.commit(false)?;
    let mut reader = db.session(ExecMode::Direct)?;
    let rows = reader.query(&statement, query, RowBounds::default())?;
    assert_eq!(rows.len(), 3);
    assert!(cache.stats().hits >= 1);
    Ok(())
}

/// Test that rolling back releases a blocking reservation without
/// publishing anything
#[test]
fn test_rollback_releases_blocking_reservations() -> Result<()> {
    let db = TestDb::create()?;
    let cache = blocking_user_cache(Duration::from_secs(5))?;

    let mut loader = db.session(ExecMode::Direct)?;
    let (statement, query) = select_all_users();
    let statement = statement.with_cache(Arc::clone(&cache));
    loader.query(&statement, query.clone(), RowBounds::default())?;
    loader.rollback(false)?;
    assert!(cache.is_empty());

    // With the reservation released, the next session loads immediately
    // instead of waiting out the five-second timeout.
    let mut session = db.session(ExecMode::Direct)?;
    let rows = session.query(&statement, query, RowBounds::default())?;
    assert_eq!(rows.len(), 3);
    Ok(())
}
