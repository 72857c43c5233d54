//! Query execution tests
//!
//! Covers the read path through the assembled stack: column mapping with
//! typed decoding, local-cache handle sharing, row bounds, singleton
//! extraction, and streaming handlers.

use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rowmap_core::{DataObject, RowBounds, RowmapError, Value};
use rowmap_exec::ExecMode;
use rstest::rstest;
use std::sync::Arc;

use crate::fixtures::{TestDb, select_all_users, select_user_by_id};

/// Test that rows come back as objects with declared-type decoding applied
#[test]
fn test_queries_map_typed_columns() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Direct)?;

    let (statement, query) = select_all_users();
    let rows = session.query(&statement, query, RowBounds::default())?;
    assert_eq!(rows.len(), 3);

    let ada = &rows[0];
    assert_eq!(ada.get("id"), Some(Value::Int(1)));
    assert_eq!(ada.get("name"), Some(Value::String("ada".into())));
    assert_eq!(ada.get("active"), Some(Value::Bool(true)));
    assert_eq!(
        ada.get("born"),
        Some(Value::Date(NaiveDate::from_ymd_opt(1815, 12, 10).unwrap()))
    );
    assert_eq!(
        ada.get("settings"),
        Some(Value::Json(serde_json::json!({"theme": "dark"})))
    );

    let edsger = &rows[2];
    assert_eq!(edsger.get("active"), Some(Value::Bool(false)));
    assert_eq!(edsger.get("settings"), Some(Value::Null));
    Ok(())
}

/// Test that repeating a query in one session returns the same object
/// handles, in every execution mode
#[rstest]
#[case::direct(ExecMode::Direct)]
#[case::reuse(ExecMode::Reuse)]
#[case::batch(ExecMode::Batch)]
fn test_repeated_queries_share_local_results(#[case] mode: ExecMode) -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(mode)?;

    let (statement, query) = select_all_users();
    let first = session.query(&statement, query.clone(), RowBounds::default())?;
    let second = session.query(&statement, query, RowBounds::default())?;

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert!(
            a.same_object(b),
            "cached results should share object handles"
        );
    }
    Ok(())
}

/// Test that row bounds window the result set
#[test]
fn test_row_bounds_window_results() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Direct)?;

    let (statement, query) = select_all_users();
    let rows = session.query(&statement, query, RowBounds::new(1, 2))?;

    let ids: Vec<Option<Value>> = rows.iter().map(|row| row.get("id")).collect();
    assert_eq!(ids, vec![Some(Value::Int(2)), Some(Value::Int(3))]);
    Ok(())
}

/// Test singleton extraction: one row, no row, too many rows
#[test]
fn test_select_one_enforces_arity() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Direct)?;

    let (statement, query) = select_user_by_id(2);
    let grace = session.select_one(&statement, query)?;
    assert_eq!(
        grace.and_then(|row| row.get("name")),
        Some(Value::String("grace".into()))
    );

    let (statement, query) = select_user_by_id(99);
    assert!(session.select_one(&statement, query)?.is_none());

    let (statement, query) = select_all_users();
    let err = session.select_one(&statement, query).unwrap_err();
    assert!(matches!(err, RowmapError::TooManyRows { found: 3 }));
    Ok(())
}

/// Test that a handler receives each row and can stop the stream early
#[test]
fn test_handlers_stream_rows() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Direct)?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut handler = move |row: &DataObject| -> rowmap_core::Result<bool> {
        if let Some(Value::String(name)) = row.get("name") {
            sink.lock().push(name);
        }
        Ok(true)
    };
    let (statement, query) = select_all_users();
    session.query_with_handler(&statement, query, RowBounds::default(), &mut handler)?;
    assert_eq!(*seen.lock(), ["ada", "grace", "edsger"]);

    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    let mut stop_early = move |_: &DataObject| -> rowmap_core::Result<bool> {
        *sink.lock() += 1;
        Ok(false)
    };
    let (statement, query) = select_all_users();
    session.query_with_handler(&statement, query, RowBounds::default(), &mut stop_early)?;
    assert_eq!(*count.lock(), 1);
    Ok(())
}
