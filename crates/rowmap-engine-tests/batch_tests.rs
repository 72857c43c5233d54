//! Batched execution tests
//!
//! Runs the batch strategy against live SQLite: adjacency grouping, explicit
//! and implicit flushes, commit integration, and partial failure against a
//! real unique constraint.

use anyhow::Result;
use rowmap_core::{BoundQuery, RowmapError, Value};
use rowmap_exec::{BATCH_PENDING_ROWS, ExecMode, StatementInfo};

use crate::fixtures::{TestDb, count_users, insert_user, rename_user};

/// Test that batched writes execute at flush, not before
#[test]
fn test_batched_writes_execute_at_flush() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Batch)?;

    for (id, name) in [(4, "barbara"), (5, "donald")] {
        let (statement, query) = insert_user(id, name);
        assert_eq!(session.update(&statement, &query)?, BATCH_PENDING_ROWS);
    }

    let results = session.flush_batches()?;
    assert_eq!(results.len(), 1, "adjacent identical statements share a group");
    assert_eq!(results[0].statement_id, "user.insert");
    assert_eq!(results[0].update_counts, vec![1, 1]);
    assert_eq!(count_users(&mut session)?, 5);
    Ok(())
}

/// Test that switching statements starts a new group and flush returns one
/// result per group, in order
#[test]
fn test_flush_returns_results_per_group() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Batch)?;

    for (id, name) in [(4, "barbara"), (5, "donald")] {
        let (statement, query) = insert_user(id, name);
        session.update(&statement, &query)?;
    }
    let (statement, query) = rename_user(1, "lovelace");
    session.update(&statement, &query)?;

    let results = session.flush_batches()?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].statement_id, "user.insert");
    assert_eq!(results[0].update_counts, vec![1, 1]);
    assert_eq!(results[1].statement_id, "user.rename");
    assert_eq!(results[1].update_counts, vec![1]);
    Ok(())
}

/// Test that queries flush pending groups before reading
#[test]
fn test_queries_flush_pending_groups_first() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Batch)?;

    let (statement, query) = insert_user(4, "barbara");
    session.update(&statement, &query)?;

    assert_eq!(
        count_users(&mut session)?,
        4,
        "the read must observe the batched insert"
    );
    Ok(())
}

/// Test that commit runs pending batches and persists them
#[test]
fn test_commit_runs_pending_batches() -> Result<()> {
    let db = TestDb::create()?;

    let mut session = db.session(ExecMode::Batch)?;
    let (statement, query) = insert_user(4, "barbara");
    session.update(&statement, &query)?;
    session.commit(true)?;
    session.close(false);

    let mut reader = db.session(ExecMode::Direct)?;
    assert_eq!(count_users(&mut reader)?, 4);
    Ok(())
}

/// Test that a failing group reports completed groups and skips later ones
#[test]
fn test_partial_failure_reports_completed_groups() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Batch)?;

    for (id, name) in [(4, "barbara"), (5, "donald")] {
        let (statement, query) = insert_user(id, name);
        session.update(&statement, &query)?;
    }
    // Same SQL under a different statement id starts a second group; the
    // name collides with a seeded row, so the group hits the unique
    // constraint.
    let conflicting = StatementInfo::insert("user.insert_conflicting");
    let query = BoundQuery::new("INSERT INTO users (id, name) VALUES (?1, ?2)")
        .with_values(vec![Value::Int(6), Value::String("ada".into())]);
    session.update(&conflicting, &query)?;

    let err = session.flush_batches().unwrap_err();
    match err {
        RowmapError::Batch(failure) => {
            assert_eq!(failure.index, 1);
            assert_eq!(failure.completed.len(), 1);
            assert_eq!(failure.completed[0].update_counts, vec![1, 1]);
            assert_eq!(failure.failed.statement_id, "user.insert_conflicting");
            assert!(failure.failed.update_counts.is_empty());
        }
        other => panic!("expected a batch failure, got {other:?}"),
    }

    session.rollback(true)?;
    assert_eq!(
        count_users(&mut session)?,
        3,
        "rollback must undo the completed groups too"
    );
    Ok(())
}

/// Test that rollback discards pending groups without executing them
#[test]
fn test_rollback_discards_pending_groups() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Batch)?;

    let (statement, query) = insert_user(4, "barbara");
    session.update(&statement, &query)?;
    session.rollback(true)?;

    assert!(session.flush_batches()?.is_empty());
    assert_eq!(count_users(&mut session)?, 3);
    Ok(())
}
