//! Coerces a mapped row list into the shape a caller or target property
//! declares.

use rowmap_core::{DataObject, Result, RowmapError, Value};
use serde::{Deserialize, Serialize};

/// Declared shape of a statement's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// The row list as-is.
    #[default]
    List,
    /// A fixed-size collection; element values are copied out of the row
    /// handles rather than shared.
    Array,
    /// At most one row.
    Single,
}

/// Converts `rows` into a value of the requested shape.
///
/// `List` and `Array` both produce a [`Value::Array`] of row snapshots;
/// `Single` yields the lone row's snapshot, `Value::Null` for an empty
/// list, and an error when more than one row arrived.
pub fn extract(rows: &[DataObject], shape: ResultShape) -> Result<Value> {
    match shape {
        ResultShape::List | ResultShape::Array => {
            Ok(Value::Array(rows.iter().map(DataObject::snapshot).collect()))
        }
        ResultShape::Single => match rows {
            [] => Ok(Value::Null),
            [row] => Ok(row.snapshot()),
            _ => Err(RowmapError::TooManyRows { found: rows.len() }),
        },
    }
}

/// Reduces a row list to at most one shared handle, for callers that asked
/// for a single object rather than a value snapshot.
pub fn single(mut rows: Vec<DataObject>) -> Result<Option<DataObject>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        found => Err(RowmapError::TooManyRows { found }),
    }
}
