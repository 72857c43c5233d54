//! Row mapping contracts and the default object mapper.

use rowmap_cache::CacheKey;
use rowmap_core::{BoundQuery, DataObject, Result, RowBounds, RowSource, Value};

use crate::extractor::ResultShape;
use crate::statement::StatementInfo;

/// Session facet handed to mappers so they can resolve nested statements
/// while a row is being mapped.
///
/// Implemented by the executor. A nested statement can either be run right
/// away with [`load_nested`](Self::load_nested) (which re-enters the query
/// machinery and bumps the nesting depth), or, when the key is already
/// known to the local cache, parked with [`defer_load`](Self::defer_load)
/// until the outermost query finishes.
pub trait NestedLoader {
    fn create_cache_key(
        &self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
    ) -> Result<CacheKey>;

    /// True when the local cache has any entry for the key, including an
    /// in-flight placeholder.
    fn is_cached(&self, key: &CacheKey) -> bool;

    /// Assign the extracted result for `key` to `target.property`, now if
    /// the key is already resolvable, otherwise when the outermost query
    /// returns.
    fn defer_load(
        &mut self,
        target: DataObject,
        property: &str,
        key: CacheKey,
        shape: ResultShape,
    ) -> Result<()>;

    /// Run a nested statement to completion and extract its result.
    fn load_nested(
        &mut self,
        statement: &StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
        shape: ResultShape,
    ) -> Result<Value>;
}

/// Maps raw rows from a [`RowSource`] into shared object handles.
pub trait RowMapper: Send + Sync {
    /// Materialize every row within `bounds`.
    fn map_rows(
        &self,
        source: &mut dyn RowSource,
        bounds: &RowBounds,
        loader: &mut dyn NestedLoader,
    ) -> Result<Vec<DataObject>>;

    /// Map exactly one row, for streaming consumers. Bounds are the
    /// caller's concern here.
    fn map_next(
        &self,
        source: &mut dyn RowSource,
        loader: &mut dyn NestedLoader,
    ) -> Result<Option<DataObject>>;
}

/// Callback for streaming query consumers; return `false` to stop early.
pub trait RowHandler {
    fn handle(&mut self, row: &DataObject) -> Result<bool>;
}

impl<F> RowHandler for F
where
    F: FnMut(&DataObject) -> Result<bool>,
{
    fn handle(&mut self, row: &DataObject) -> Result<bool> {
        self(row)
    }
}

/// Default mapper: each row becomes an object keyed by column name.
/// Ignores the nested loader; plain column mapping has no associations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectMapper;

impl RowMapper for ObjectMapper {
    fn map_rows(
        &self,
        source: &mut dyn RowSource,
        bounds: &RowBounds,
        _loader: &mut dyn NestedLoader,
    ) -> Result<Vec<DataObject>> {
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
            mapped.push(DataObject::from_row(&row));
        }
        Ok(mapped)
    }

    fn map_next(
        &self,
        source: &mut dyn RowSource,
        _loader: &mut dyn NestedLoader,
    ) -> Result<Option<DataObject>> {
        Ok(source.next_row()?.map(|row| DataObject::from_row(&row)))
    }
}
