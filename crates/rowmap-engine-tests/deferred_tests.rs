//! Nested and deferred loading tests
//!
//! Custom mappers resolve association statements through the session while
//! rows are being mapped, park loads against in-flight keys, and hand lazy
//! cells to callers for on-demand resolution.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rowmap_core::{
    BoundQuery, DataObject, PathWriter, PropertyWriter, RowBounds, RowSource, RowmapError, Value,
};
use rowmap_exec::{ExecMode, LazyValue, NestedLoader, ResultShape, RowMapper, StatementInfo};

use crate::fixtures::{TestDb, select_all_users, select_orders_for_user};

/// Attaches each user's orders while the user row is mapped.
struct OrderLoadingMapper;

impl OrderLoadingMapper {
    fn attach_orders(
        &self,
        object: &DataObject,
        loader: &mut dyn NestedLoader,
    ) -> rowmap_core::Result<()> {
        let user_id = object
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| RowmapError::Mapping("user row without an id".into()))?;
        let (statement, query) = select_orders_for_user(user_id);
        let orders = loader.load_nested(&statement, query, RowBounds::default(), ResultShape::List)?;
        PathWriter.set_property(object, "orders", orders)
    }
}

impl RowMapper for OrderLoadingMapper {
    fn map_rows(
        &self,
        source: &mut dyn RowSource,
        bounds: &RowBounds,
        loader: &mut dyn NestedLoader,
    ) -> rowmap_core::Result<Vec<DataObject>> {
        let mut skipped = 0;
        let mut mapped = Vec::new();
        while let Some(row) = source.next_row()? {
            if skipped < bounds.offset {
                skipped += 1;
                continue;
            }
            if mapped.len() >= bounds.limit {
                break;
            }
            let object = DataObject::from_row(&row);
            self.attach_orders(&object, loader)?;
            mapped.push(object);
        }
        Ok(mapped)
    }

    fn map_next(
        &self,
        source: &mut dyn RowSource,
        loader: &mut dyn NestedLoader,
    ) -> rowmap_core::Result<Option<DataObject>> {
        match source.next_row()? {
            Some(row) => {
                let object = DataObject::from_row(&row);
                self.attach_orders(&object, loader)?;
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }
}

/// Defers a load for the first row against the outer query's own key.
struct PeerDeferringMapper;

impl RowMapper for PeerDeferringMapper {
    fn map_rows(
        &self,
        source: &mut dyn RowSource,
        bounds: &RowBounds,
        loader: &mut dyn NestedLoader,
    ) -> rowmap_core::Result<Vec<DataObject>> {
        let mut mapped: Vec<DataObject> = Vec::new();
        while let Some(row) = source.next_row()? {
            if mapped.len() >= bounds.limit {
                break;
            }
            let object = DataObject::from_row(&row);
            if mapped.is_empty() {
                let (statement, query) = select_all_users();
                let key = loader.create_cache_key(&statement, &query, &RowBounds::default())?;
                assert!(
                    loader.is_cached(&key),
                    "the outer key should be in flight during mapping"
                );
                loader.defer_load(object.clone(), "peers", key, ResultShape::Array)?;
            }
            mapped.push(object);
        }
        Ok(mapped)
    }

    fn map_next(
        &self,
        source: &mut dyn RowSource,
        _loader: &mut dyn NestedLoader,
    ) -> rowmap_core::Result<Option<DataObject>> {
        Ok(source.next_row()?.map(|row| DataObject::from_row(&row)))
    }
}

fn order_count(row: &DataObject) -> Option<usize> {
    match row.get("orders") {
        Some(Value::Array(orders)) => Some(orders.len()),
        _ => None,
    }
}

/// Test that nested statements resolve through the session during mapping
#[test]
fn test_nested_statements_resolve_through_the_session() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session_with_mapper(ExecMode::Direct, Arc::new(OrderLoadingMapper))?;

    let (statement, query) = select_all_users();
    let rows = session.query(&statement, query, RowBounds::default())?;

    assert_eq!(rows.len(), 3);
    assert_eq!(order_count(&rows[0]), Some(2), "ada has two orders");
    assert_eq!(order_count(&rows[1]), Some(1), "grace has one order");
    assert_eq!(order_count(&rows[2]), Some(0), "edsger has none");

    let first_total = rows[0]
        .get("orders")
        .and_then(|orders| orders.as_array().and_then(|o| o.first().cloned()))
        .and_then(|order| order.get("total").cloned());
    assert_eq!(first_total, Some(Value::Float(12.5)));
    Ok(())
}

/// Test that nested statements also resolve on the streaming path
#[test]
fn test_nested_loads_work_while_streaming() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session_with_mapper(ExecMode::Direct, Arc::new(OrderLoadingMapper))?;

    let with_orders = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&with_orders);
    let mut handler = move |row: &DataObject| -> rowmap_core::Result<bool> {
        if order_count(row).is_some() {
            *sink.lock() += 1;
        }
        Ok(true)
    };

    let (statement, query) = select_all_users();
    session.query_with_handler(&statement, query, RowBounds::default(), &mut handler)?;
    assert_eq!(*with_orders.lock(), 3);
    Ok(())
}

/// Test that a load deferred against an in-flight key is applied once the
/// outermost query finishes
#[test]
fn test_deferred_loads_fill_properties_after_the_outer_query() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session_with_mapper(ExecMode::Direct, Arc::new(PeerDeferringMapper))?;

    let (statement, query) = select_all_users();
    let rows = session.query(&statement, query, RowBounds::default())?;

    assert_eq!(rows.len(), 3);
    match rows[0].get("peers") {
        Some(Value::Array(peers)) => assert_eq!(peers.len(), 3),
        other => panic!("expected the deferred peers array, got {other:?}"),
    }
    assert_eq!(rows[1].get("peers"), None, "only the first row deferred");
    Ok(())
}

/// Test that a lazy cell resolves on demand through its session
#[test]
fn test_lazy_values_resolve_on_demand() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Direct)?;

    let (statement, query) = select_orders_for_user(1);
    let mut lazy = LazyValue::new(
        &session,
        statement,
        query,
        RowBounds::default(),
        ResultShape::List,
    );
    assert!(!lazy.is_loaded());
    assert!(lazy.get().is_none());

    lazy.load_with(&mut session)?;
    assert!(lazy.is_loaded());
    match lazy.get() {
        Some(Value::Array(orders)) => assert_eq!(orders.len(), 2),
        other => panic!("expected an order array, got {other:?}"),
    }

    // Loading again is a no-op.
    lazy.load_with(&mut session)?;
    assert!(lazy.is_loaded());
    Ok(())
}

/// Test that a failed lazy load leaves the cell unloaded and retryable
#[test]
fn test_failed_lazy_loads_leave_the_cell_unloaded() -> Result<()> {
    let db = TestDb::create()?;
    let mut session = db.session(ExecMode::Direct)?;

    let statement = StatementInfo::select("order.broken");
    let query = BoundQuery::new("SELECT * FROM missing_table");
    let mut lazy = LazyValue::new(
        &session,
        statement,
        query,
        RowBounds::default(),
        ResultShape::List,
    );

    assert!(lazy.load_with(&mut session).is_err());
    assert!(!lazy.is_loaded());
    assert!(lazy.get().is_none());
    Ok(())
}
