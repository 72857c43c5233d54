//! Explicit lazy cells for associations resolved on first access.
//!
//! Runtime accessor interception is off the table, so a lazily loaded
//! association is an explicit two-state cell: it starts as an unloaded
//! statement invocation and becomes a plain value once resolved.

use std::thread::{self, ThreadId};

use rowmap_core::{BoundQuery, Result, RowBounds, RowmapError, Value};
use tracing::trace;
use uuid::Uuid;

use crate::executor::Executor;
use crate::extractor::{self, ResultShape};
use crate::statement::StatementInfo;

#[derive(Debug)]
enum LazyState {
    Unloaded {
        statement: StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
        shape: ResultShape,
    },
    Loaded(Value),
}

/// An association resolved on first access instead of during row mapping.
///
/// The cell remembers which session and thread created it. Resolving
/// through the originating session is only valid on the originating
/// thread while that session is open; a cell that crossed threads or
/// outlived its session must be given a fresh session against the same
/// data source.
#[derive(Debug)]
pub struct LazyValue {
    state: LazyState,
    origin_session: Uuid,
    origin_thread: ThreadId,
}

impl LazyValue {
    pub fn new(
        session: &Executor,
        statement: StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
        shape: ResultShape,
    ) -> Self {
        Self {
            state: LazyState::Unloaded {
                statement,
                query,
                bounds,
                shape,
            },
            origin_session: session.id(),
            origin_thread: thread::current().id(),
        }
    }

    /// Wrap a value that was resolved eagerly, so eager and lazy
    /// associations can live behind the same field type.
    pub fn loaded(session: &Executor, value: Value) -> Self {
        Self {
            state: LazyState::Loaded(value),
            origin_session: session.id(),
            origin_thread: thread::current().id(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LazyState::Loaded(_))
    }

    /// The resolved value, or `None` while the cell is unloaded.
    pub fn get(&self) -> Option<&Value> {
        match &self.state {
            LazyState::Loaded(value) => Some(value),
            LazyState::Unloaded { .. } => None,
        }
    }

    /// Resolve the association through `session` unless already loaded.
    /// On failure the cell stays unloaded and can be retried.
    pub fn load_with(&mut self, session: &mut Executor) -> Result<()> {
        let (statement, query, bounds, shape) = match &self.state {
            LazyState::Loaded(_) => return Ok(()),
            LazyState::Unloaded {
                statement,
                query,
                bounds,
                shape,
            } => (statement.clone(), query.clone(), *bounds, *shape),
        };
        if session.is_closed() {
            return Err(RowmapError::Closed);
        }
        if session.id() == self.origin_session && thread::current().id() != self.origin_thread {
            return Err(RowmapError::Mapping(
                "lazy association crossed threads; resolve it through a new session instead of the originating one".into(),
            ));
        }
        trace!(statement_id = %statement.id, "resolving lazy association");
        let rows = session.query(&statement, query, bounds)?;
        self.state = LazyState::Loaded(extractor::extract(&rows, shape)?);
        Ok(())
    }

    /// Load if needed, then borrow the value.
    pub fn value(&mut self, session: &mut Executor) -> Result<&Value> {
        self.load_with(session)?;
        match &self.state {
            LazyState::Loaded(value) => Ok(value),
            LazyState::Unloaded { .. } => Err(RowmapError::Mapping(
                "lazy association did not resolve".into(),
            )),
        }
    }
}
