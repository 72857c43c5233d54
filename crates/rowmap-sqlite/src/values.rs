//! Conversions between rowmap values and SQLite storage classes

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rowmap_core::{Result, RowmapError, Value};
use rusqlite::types::ValueRef;

/// Convert bound parameter values to rusqlite-compatible types.
///
/// Composite values cannot be bound as SQLite parameters; callers expand
/// collections into individual placeholders before binding.
pub(crate) fn bind_values(values: &[Value]) -> Result<Vec<rusqlite::types::Value>> {
    values.iter().map(bind_value).collect()
}

fn bind_value(value: &Value) -> Result<rusqlite::types::Value> {
    let bound = match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Uuid(u) => rusqlite::types::Value::Text(u.to_string()),
        Value::Date(d) => rusqlite::types::Value::Text(d.to_string()),
        Value::Time(t) => rusqlite::types::Value::Text(t.to_string()),
        Value::DateTime(dt) => rusqlite::types::Value::Text(dt.to_string()),
        Value::Json(j) => rusqlite::types::Value::Text(j.to_string()),
        Value::Array(_) | Value::Object(_) => {
            return Err(RowmapError::Statement(format!(
                "cannot bind composite value {} as a SQLite parameter",
                value
            )));
        }
    };
    Ok(bound)
}

/// Convert a fetched column to a rowmap value, guided by the column's
/// declared type.
///
/// SQLite stores dates, times, UUIDs and JSON as TEXT; the declared type
/// from `CREATE TABLE` (sqlite3_column_decltype) tells us which of those a
/// text column actually carries. Text that fails to parse as its declared
/// type falls back to a plain string rather than erroring, since SQLite
/// never enforced the declaration in the first place.
pub(crate) fn column_value(decl_type: Option<&str>, raw: ValueRef<'_>) -> Value {
    let decl = decl_type.map(str::to_uppercase);
    let decl = decl.as_deref();

    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => {
            if decl_contains(decl, "BOOL") {
                Value::Bool(i != 0)
            } else {
                Value::Int(i)
            }
        }
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).to_string();
            decode_text(decl, text)
        }
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

fn decode_text(decl: Option<&str>, text: String) -> Value {
    if decl_contains(decl, "DATETIME") || decl_contains(decl, "TIMESTAMP") {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f") {
            return Value::DateTime(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f") {
            return Value::DateTime(dt);
        }
    } else if decl_contains(decl, "DATE") {
        if let Ok(d) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
            return Value::Date(d);
        }
    } else if decl_contains(decl, "TIME") {
        if let Ok(t) = NaiveTime::parse_from_str(&text, "%H:%M:%S%.f") {
            return Value::Time(t);
        }
    } else if decl_contains(decl, "JSON") {
        if let Ok(j) = serde_json::from_str(&text) {
            return Value::Json(j);
        }
    } else if decl_contains(decl, "UUID") {
        if let Ok(u) = uuid::Uuid::parse_str(&text) {
            return Value::Uuid(u);
        }
    }
    Value::String(text)
}

fn decl_contains(decl: Option<&str>, fragment: &str) -> bool {
    decl.is_some_and(|d| d.contains(fragment))
}
