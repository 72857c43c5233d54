//! Lazy, single-pass iteration over a query's rows.

use std::fmt;
use std::sync::Arc;

use rowmap_cache::CacheKey;
use rowmap_core::{BoundQuery, DataObject, Result, RowBounds, RowSource, RowmapError, Value};
use tracing::debug;

use crate::extractor::ResultShape;
use crate::mapper::{NestedLoader, RowMapper};
use crate::statement::StatementInfo;

/// Forward-only iterator that maps rows on demand instead of materializing
/// the whole result list.
///
/// Cursors are detached from the session that opened them: they bypass
/// both cache tiers and cannot resolve nested statements. Iteration yields
/// `Result<DataObject>`; the first error closes the cursor, as does
/// exhausting or dropping it.
pub struct QueryCursor {
    statement_id: String,
    source: Option<Box<dyn RowSource>>,
    mapper: Arc<dyn RowMapper>,
    bounds: RowBounds,
    skipped: usize,
    fetched: usize,
}

impl QueryCursor {
    pub(crate) fn new(
        statement_id: String,
        source: Box<dyn RowSource>,
        mapper: Arc<dyn RowMapper>,
        bounds: RowBounds,
    ) -> Self {
        Self {
            statement_id,
            source: Some(source),
            mapper,
            bounds,
            skipped: 0,
            fetched: 0,
        }
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    /// True until the cursor has been exhausted or closed.
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Number of rows yielded so far.
    pub fn position(&self) -> usize {
        self.fetched
    }

    /// Release the underlying row source. Further iteration yields nothing.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(statement_id = %self.statement_id, rows = self.fetched, "cursor closed");
        }
    }

    fn advance(&mut self) -> Result<Option<DataObject>> {
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(None),
        };
        // Offset rows are discarded raw, without mapping them.
        while self.skipped < self.bounds.offset {
            if source.next_row()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        if self.fetched >= self.bounds.limit {
            return Ok(None);
        }
        let row = self.mapper.map_next(source.as_mut(), &mut DetachedLoader)?;
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }
}

impl Iterator for QueryCursor {
    type Item = Result<DataObject>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                self.close();
                Some(Err(err))
            }
        }
    }
}

impl Drop for QueryCursor {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCursor")
            .field("statement_id", &self.statement_id)
            .field("open", &self.source.is_some())
            .field("fetched", &self.fetched)
            .finish()
    }
}

/// Stand-in loader for mapping outside a session.
struct DetachedLoader;

impl NestedLoader for DetachedLoader {
    fn create_cache_key(
        &self,
        _statement: &StatementInfo,
        _query: &BoundQuery,
        _bounds: &RowBounds,
    ) -> Result<CacheKey> {
        Err(detached())
    }

    fn is_cached(&self, _key: &CacheKey) -> bool {
        false
    }

    fn defer_load(
        &mut self,
        _target: DataObject,
        _property: &str,
        _key: CacheKey,
        _shape: ResultShape,
    ) -> Result<()> {
        Err(detached())
    }

    fn load_nested(
        &mut self,
        _statement: &StatementInfo,
        _query: BoundQuery,
        _bounds: RowBounds,
        _shape: ResultShape,
    ) -> Result<Value> {
        Err(detached())
    }
}

fn detached() -> RowmapError {
    RowmapError::Mapping("nested statements cannot be resolved during cursor iteration".into())
}
