//! Property assignment over mapped object graphs
//!
//! Deferred loads and lazy associations assign values back into objects they
//! did not construct, so the assignment goes through a contract rather than
//! concrete types. `PathWriter` is the default implementation over the
//! `Value` graph; hosts mapping into their own representations supply their
//! own writer.

use crate::error::{Result, RowmapError};
use crate::types::{DataObject, Value};

/// Generic property access used by the deferred-load coordinator
pub trait PropertyWriter: Send + Sync {
    /// Assign `value` at `path` inside `target`
    fn set_property(&self, target: &DataObject, path: &str, value: Value) -> Result<()>;

    /// Read the value at `path`, or `None` if the path is not populated
    fn get_property(&self, target: &DataObject, path: &str) -> Result<Option<Value>>;
}

/// Default writer navigating dotted paths with optional `[index]` segments,
/// e.g. `"customer.orders[0].total"`.
///
/// Missing intermediate objects are created on assignment; indexing past the
/// end of an array is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathWriter;

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment<'_>>> {
    if path.is_empty() {
        return Err(RowmapError::Mapping("empty property path".into()));
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if name.is_empty() && rest.is_empty() {
            return Err(RowmapError::Mapping(format!(
                "empty segment in property path '{}'",
                path
            )));
        }
        if !name.is_empty() {
            segments.push(Segment::Field(name));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| {
                RowmapError::Mapping(format!("unclosed index in property path '{}'", path))
            })?;
            let index = rest[1..close].parse::<usize>().map_err(|_| {
                RowmapError::Mapping(format!("invalid index in property path '{}'", path))
            })?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(RowmapError::Mapping(format!(
                    "malformed property path '{}'",
                    path
                )));
            }
        }
    }
    Ok(segments)
}

fn descend<'v>(current: &'v mut Value, segment: &Segment<'_>, path: &str) -> Result<&'v mut Value> {
    match segment {
        Segment::Field(name) => {
            if current.is_null() {
                *current = Value::Object(Default::default());
            }
            match current {
                Value::Object(map) => Ok(map
                    .entry(name.to_string())
                    .or_insert(Value::Object(Default::default()))),
                other => Err(RowmapError::Mapping(format!(
                    "cannot traverse '{}' through non-object value {} in path '{}'",
                    name, other, path
                ))),
            }
        }
        Segment::Index(index) => match current {
            Value::Array(items) => items.get_mut(*index).ok_or_else(|| {
                RowmapError::Mapping(format!(
                    "index {} out of bounds in property path '{}'",
                    index, path
                ))
            }),
            other => Err(RowmapError::Mapping(format!(
                "cannot index non-array value {} in path '{}'",
                other, path
            ))),
        },
    }
}

impl PropertyWriter for PathWriter {
    fn set_property(&self, target: &DataObject, path: &str, value: Value) -> Result<()> {
        let segments = parse_path(path)?;
        let (last, prefix) = segments.split_last().ok_or_else(|| {
            RowmapError::Mapping(format!("empty property path '{}'", path))
        })?;

        let mut guard = target.write();
        let mut current: &mut Value = &mut guard;
        for segment in prefix {
            current = descend(current, segment, path)?;
        }

        match last {
            Segment::Field(name) => {
                if current.is_null() {
                    *current = Value::Object(Default::default());
                }
                match current {
                    Value::Object(map) => {
                        map.insert(name.to_string(), value);
                        Ok(())
                    }
                    other => Err(RowmapError::Mapping(format!(
                        "cannot set field '{}' on non-object value {} in path '{}'",
                        name, other, path
                    ))),
                }
            }
            Segment::Index(index) => match current {
                Value::Array(items) => {
                    let slot = items.get_mut(*index).ok_or_else(|| {
                        RowmapError::Mapping(format!(
                            "index {} out of bounds in property path '{}'",
                            index, path
                        ))
                    })?;
                    *slot = value;
                    Ok(())
                }
                other => Err(RowmapError::Mapping(format!(
                    "cannot index non-array value {} in path '{}'",
                    other, path
                ))),
            },
        }
    }

    fn get_property(&self, target: &DataObject, path: &str) -> Result<Option<Value>> {
        let segments = parse_path(path)?;
        let guard = target.read();
        let mut current: &Value = &guard;
        for segment in &segments {
            match segment {
                Segment::Field(name) => match current.get(name) {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
                Segment::Index(index) => match current {
                    Value::Array(items) => match items.get(*index) {
                        Some(next) => current = next,
                        None => return Ok(None),
                    },
                    _ => return Ok(None),
                },
            }
        }
        Ok(Some(current.clone()))
    }
}
