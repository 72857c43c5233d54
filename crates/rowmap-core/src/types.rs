//! Core value model for rowmap

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A database value that can represent any bound parameter or result column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// Time (hour, minute, second, nanosecond)
    Time(NaiveTime),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
    /// JSON value
    Json(serde_json::Value),
    /// Array of values
    Array(Vec<Value>),
    /// Ordered map of named values (a mapped object)
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as an array slice
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as an object map
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a field of an object value
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(name),
            _ => None,
        }
    }
}

// Equality and hashing must agree so values can serve as cache-key parts.
// Floats compare through their bit pattern, which makes equality total.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Time(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
            Value::Json(v) => hash_json(v, state),
            Value::Array(v) => v.hash(state),
            Value::Object(v) => v.hash(state),
        }
    }
}

// serde_json::Value has no Hash impl; hash it structurally with object keys
// visited in sorted order so the result is consistent with its equality.
fn hash_json<H: Hasher>(value: &serde_json::Value, state: &mut H) {
    match value {
        serde_json::Value::Null => 0u8.hash(state),
        serde_json::Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        serde_json::Value::Number(n) => {
            2u8.hash(state);
            if let Some(i) = n.as_i64() {
                i.hash(state);
            } else if let Some(u) = n.as_u64() {
                u.hash(state);
            } else {
                n.as_f64().unwrap_or(0.0).to_bits().hash(state);
            }
        }
        serde_json::Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        serde_json::Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_json(item, state);
            }
        }
        serde_json::Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                key.hash(state);
                hash_json(&map[key], state);
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
            Value::Array(v) => write!(f, "[{} items]", v.len()),
            Value::Object(v) => write!(f, "{{{} fields}}", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A row from a query result
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    /// Column names
    columns: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Convert into an object value keyed by column name
    pub fn to_object(&self) -> Value {
        Value::Object(
            self.columns
                .iter()
                .cloned()
                .zip(self.values.iter().cloned())
                .collect(),
        )
    }
}

/// A shared, mutable handle over a mapped object graph.
///
/// Cloning a `DataObject` shares the underlying value, so a handle stored in
/// a result list, a cache entry, and a deferred-load target all observe the
/// same object. `snapshot` and `deep_clone` produce independent copies.
#[derive(Clone)]
pub struct DataObject {
    inner: Arc<RwLock<Value>>,
}

impl DataObject {
    /// Wrap a value in a new shared handle
    pub fn new(value: Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Create an empty object (`Value::Object` with no fields)
    pub fn empty() -> Self {
        Self::new(Value::Object(BTreeMap::new()))
    }

    /// Build a handle from a result row
    pub fn from_row(row: &Row) -> Self {
        Self::new(row.to_object())
    }

    /// Copy of the current value
    pub fn snapshot(&self) -> Value {
        self.inner.read().clone()
    }

    /// Independent handle over a copy of the current value
    pub fn deep_clone(&self) -> Self {
        Self::new(self.snapshot())
    }

    /// Read access to the underlying value
    pub fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.inner.read()
    }

    /// Write access to the underlying value
    pub fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.inner.write()
    }

    /// Look up a top-level field if the value is an object
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().get(name).cloned()
    }

    /// Whether two handles share the same underlying object
    pub fn same_object(&self, other: &DataObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for DataObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataObject({:?})", *self.inner.read())
    }
}

impl PartialEq for DataObject {
    fn eq(&self, other: &Self) -> bool {
        if self.same_object(other) {
            return true;
        }
        *self.inner.read() == *other.inner.read()
    }
}

impl Eq for DataObject {}

impl From<Value> for DataObject {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Serialize for DataObject {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataObject {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(DataObject::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_float_equality_is_total() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, Value::Float(f64::NAN));
        assert_eq!(hash_of(&nan), hash_of(&Value::Float(f64::NAN)));
        assert_ne!(Value::Float(1.0), Value::Float(2.0));
    }

    #[test]
    fn test_json_hash_ignores_key_order() {
        let a = Value::Json(serde_json::json!({"a": 1, "b": [true, null]}));
        let b = Value::Json(serde_json::json!({"b": [true, null], "a": 1}));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_row_access() {
        let row = Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::Int(7), Value::String("alice".into())],
        );
        assert_eq!(row.get(0), Some(&Value::Int(7)));
        assert_eq!(row.get_by_name("name"), Some(&Value::String("alice".into())));
        assert_eq!(row.get_by_name("missing"), None);

        let obj = row.to_object();
        assert_eq!(obj.get("id"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_data_object_sharing() {
        let row = Row::new(vec!["id".into()], vec![Value::Int(1)]);
        let a = DataObject::from_row(&row);
        let b = a.clone();

        if let Value::Object(map) = &mut *a.write() {
            map.insert("extra".into(), Value::Bool(true));
        }
        assert_eq!(b.get("extra"), Some(Value::Bool(true)));
        assert!(a.same_object(&b));

        let c = a.deep_clone();
        assert!(!c.same_object(&a));
        assert_eq!(c.snapshot(), a.snapshot());
    }

    #[test]
    fn test_data_object_serde_round_trip() {
        let obj = DataObject::new(Value::Object(BTreeMap::from([
            ("id".to_string(), Value::Int(3)),
            ("name".to_string(), Value::String("bo".into())),
        ])));
        let json = serde_json::to_string(&obj).unwrap();
        let back: DataObject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obj);
    }
}
