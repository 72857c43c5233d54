//! The unit-of-work executor.
//!
//! An [`Executor`] owns one transaction, one local result cache, one
//! deferred-load queue and a staged view of every shared cache it touches.
//! It is single-threaded by contract; cross-session coordination happens
//! inside the shared caches, never here.
//!
//! Queries follow the placeholder protocol: a `Pending` entry is written
//! to the local cache before the data source runs, then replaced with the
//! result on success or removed on failure. A query that observes its own
//! placeholder is re-entering itself and fails instead of looping.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rowmap_cache::{CacheKey, SharedCache};
use rowmap_core::{
    BatchResult, BoundQuery, DataObject, PathWriter, PropertyWriter, Result, RowBounds,
    RowmapError, Transaction, Value,
};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::{ExecMode, LocalCacheScope, SessionConfig};
use crate::cursor::QueryCursor;
use crate::deferred::DeferredLoad;
use crate::extractor::{self, ResultShape};
use crate::local::{CacheEntry, LocalCache};
use crate::mapper::{NestedLoader, ObjectMapper, RowHandler, RowMapper};
use crate::staged::StagedCaches;
use crate::statement::StatementInfo;
use crate::strategy::{BatchStrategy, DirectStrategy, ExecStrategy, ReuseStrategy};


/// One unit of work over one transaction.
pub struct Executor {
    id: Uuid,
    config: SessionConfig,
    tx: Box<dyn Transaction>,
    strategy: Box<dyn ExecStrategy>,
    mapper: Arc<dyn RowMapper>,
    writer: Box<dyn PropertyWriter>,
    local: LocalCache,
    deferred: VecDeque<DeferredLoad>,
    staged: StagedCaches,
    depth: usize,
    closed: bool,
}

impl Executor {
    /// Open a session with the default column-to-property mapper.
    pub fn new(config: SessionConfig, tx: Box<dyn Transaction>) -> Self {
        Self::with_mapper(config, tx, Arc::new(ObjectMapper))
    }

    /// Open a session with a custom row mapper.
    pub fn with_mapper(
        config: SessionConfig,
        tx: Box<dyn Transaction>,
        mapper: Arc<dyn RowMapper>,
    ) -> Self {
        let strategy: Box<dyn ExecStrategy> = match config.mode {
            ExecMode::Direct => Box::new(DirectStrategy::new()),
            ExecMode::Reuse => Box::new(ReuseStrategy::new()),
            ExecMode::Batch => Box::new(BatchStrategy::new()),
        };
        let id = Uuid::new_v4();
        debug!(session = %id, mode = ?config.mode, environment = %config.environment, "opening session");
        Self {
            id,
            config,
            tx,
            strategy,
            mapper,
            writer: Box::new(PathWriter),
            local: LocalCache::new(),
            deferred: VecDeque::new(),
            staged: StagedCaches::new(),
            depth: 0,
            closed: false,
        }
    }

    /// Replace the property writer used to assign deferred loads.
    pub fn with_property_writer(mut self, writer: Box<dyn PropertyWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> ExecMode {
        self.config.mode
    }

    /// Run a write statement. In batch mode the work is only appended to
    /// the current batch group and the returned count is
    /// [`BATCH_PENDING_ROWS`](crate::strategy::BATCH_PENDING_ROWS) until
    /// [`flush_batches`](Self::flush_batches) runs it.
    #[tracing::instrument(skip(self, statement, query), fields(statement_id = %statement.id, sql_preview = %query.sql.chars().take(100).collect::<String>()))]
    pub fn update(&mut self, statement: &StatementInfo, query: &BoundQuery) -> Result<u64> {
        self.ensure_open()?;
        if let Some(cache) = self.shared_cache_for(statement) {
            if statement.flush_cache {
                self.staged.clear(&cache);
            }
        }
        // Any write invalidates every locally cached read.
        self.local.clear();
        let timeout = self.effective_timeout(statement);
        self.strategy
            .run_update(self.tx.as_mut(), statement, query, timeout)
    }

    /// Run a read statement and materialize every row within `bounds`.
    ///
    /// Results are served from the local cache when the same key was
    /// already queried in this session, and from the statement's shared
    /// cache when one is attached and populated.
    #[tracing::instrument(skip(self, statement, query), fields(statement_id = %statement.id, sql_preview = %query.sql.chars().take(100).collect::<String>()))]
    pub fn query(
        &mut self,
        statement: &StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
    ) -> Result<Vec<DataObject>> {
        self.ensure_open()?;
        let key = self.create_cache_key(statement, &query, &bounds)?;
        if let Some(cache) = self.shared_cache_for(statement) {
            if statement.flush_cache {
                self.staged.clear(&cache);
            }
            if statement.use_cache {
                if let Some(rows) = self.staged.get(&cache, &key)? {
                    debug!(cache_id = %cache.id(), "shared cache hit");
                    return Ok(rows);
                }
                let rows = self.query_local(statement, &query, &bounds, &key, None)?;
                self.staged.put(&cache, key, rows.clone());
                return Ok(rows);
            }
        }
        self.query_local(statement, &query, &bounds, &key, None)
    }

    /// Run a read statement, feeding each mapped row to `handler` instead
    /// of materializing a result list.
    ///
    /// Streaming consumers trade caching away: the local lookup is skipped
    /// and nothing is written back, though the in-flight placeholder still
    /// guards against re-entrant recursion.
    pub fn query_with_handler(
        &mut self,
        statement: &StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        self.ensure_open()?;
        let key = self.create_cache_key(statement, &query, &bounds)?;
        if let Some(cache) = self.shared_cache_for(statement) {
            if statement.flush_cache {
                self.staged.clear(&cache);
            }
        }
        self.query_local(statement, &query, &bounds, &key, Some(handler))?;
        Ok(())
    }

    /// Run a read statement and return a lazy cursor over its rows.
    ///
    /// Cursors bypass both cache tiers; streaming semantics are
    /// incompatible with eager materialization. In batch mode any pending
    /// groups are flushed first so the cursor observes their writes.
    pub fn query_cursor(
        &mut self,
        statement: &StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
    ) -> Result<QueryCursor> {
        self.ensure_open()?;
        let timeout = self.effective_timeout(statement);
        let source = self
            .strategy
            .run_query(self.tx.as_mut(), statement, &query, timeout)?;
        Ok(QueryCursor::new(
            statement.id.clone(),
            source,
            Arc::clone(&self.mapper),
            bounds,
        ))
    }

    /// Run a read statement expected to produce at most one row.
    pub fn select_one(
        &mut self,
        statement: &StatementInfo,
        query: BoundQuery,
    ) -> Result<Option<DataObject>> {
        let rows = self.query(statement, query, RowBounds::default())?;
        extractor::single(rows)
    }

    /// Execute every pending batch group and return the per-group results.
    /// A no-op outside batch mode.
    pub fn flush_batches(&mut self) -> Result<Vec<BatchResult>> {
        self.ensure_open()?;
        self.strategy.flush()
    }

    /// Finish the unit of work: clear session state, flush pending
    /// batches, commit the transaction when `required`, then publish the
    /// staged shared-cache views.
    pub fn commit(&mut self, required: bool) -> Result<()> {
        self.ensure_open()?;
        debug!(session = %self.id, required, "committing");
        self.local.clear();
        self.deferred.clear();
        let flushed = self.strategy.flush()?;
        if !flushed.is_empty() {
            debug!(groups = flushed.len(), "flushed pending batch groups before commit");
        }
        if required {
            self.tx.commit()?;
        }
        self.staged.commit_all()
    }

    /// Abandon the unit of work: clear session state, discard pending
    /// batches, roll the transaction back when `required`, and drop every
    /// staged shared-cache view.
    pub fn rollback(&mut self, required: bool) -> Result<()> {
        self.ensure_open()?;
        debug!(session = %self.id, required, "rolling back");
        self.local.clear();
        self.deferred.clear();
        self.strategy.release();
        let outcome = if required { self.tx.rollback() } else { Ok(()) };
        self.staged.rollback_all();
        outcome
    }

    /// Close the session and its transaction. Idempotent; errors are
    /// logged rather than raised since close runs on cleanup paths.
    ///
    /// A graceful close publishes the staged cache views, a forced one
    /// discards them and rolls the transaction back.
    pub fn close(&mut self, force_rollback: bool) {
        if self.closed {
            return;
        }
        if force_rollback {
            self.staged.rollback_all();
        } else if let Err(err) = self.staged.commit_all() {
            warn!(session = %self.id, error = %err, "failed to publish staged cache entries on close");
        }
        self.local.clear();
        self.deferred.clear();
        self.strategy.release();
        if force_rollback {
            if let Err(err) = self.tx.rollback() {
                warn!(session = %self.id, error = %err, "rollback on close failed");
            }
        }
        if let Err(err) = self.tx.close() {
            warn!(session = %self.id, error = %err, "closing the underlying transaction failed");
        }
        self.closed = true;
        debug!(session = %self.id, "session closed");
    }

    pub fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local.clear();
        }
    }

    /// Build the composite identity for one statement invocation. Fold
    /// order is significant and must stay identical across calls.
    pub fn create_cache_key(
        &self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
    ) -> Result<CacheKey> {
        self.ensure_open()?;
        let mut key = CacheKey::new();
        key.update(statement.id.as_str());
        key.update(clamp_bound(bounds.offset));
        key.update(clamp_bound(bounds.limit));
        key.update(query.sql.as_str());
        key.update_all(&query.values);
        key.update(self.config.environment.as_str());
        Ok(key)
    }

    fn query_local(
        &mut self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
        key: &CacheKey,
        handler: Option<&mut dyn RowHandler>,
    ) -> Result<Vec<DataObject>> {
        if self.depth == 0 && statement.flush_cache {
            self.local.clear();
        }
        self.depth += 1;
        let mut outcome = self.lookup_or_run(statement, query, bounds, key, handler);
        self.depth -= 1;
        if self.depth == 0 {
            if outcome.is_ok() {
                if let Err(err) = self.drain_deferred() {
                    outcome = Err(err);
                }
            }
            if self.config.local_scope == LocalCacheScope::Statement {
                self.local.clear();
            }
        }
        outcome
    }

    fn lookup_or_run(
        &mut self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
        key: &CacheKey,
        handler: Option<&mut dyn RowHandler>,
    ) -> Result<Vec<DataObject>> {
        if handler.is_none() {
            match self.local.lookup(key) {
                Some(CacheEntry::Ready(rows)) => {
                    let rows = rows.clone();
                    debug!(statement_id = %statement.id, "local cache hit");
                    return Ok(rows);
                }
                Some(CacheEntry::Pending) => {
                    return Err(RowmapError::RecursiveQuery(statement.id.clone()));
                }
                None => {}
            }
        }
        self.query_from_database(statement, query, bounds, key, handler)
    }

    fn query_from_database(
        &mut self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
        key: &CacheKey,
        handler: Option<&mut dyn RowHandler>,
    ) -> Result<Vec<DataObject>> {
        let streaming = handler.is_some();
        self.local.put_pending(key.clone());
        match self.run_and_map(statement, query, bounds, handler) {
            Ok(rows) => {
                if streaming {
                    // Rows already went to the handler; only the recursion
                    // guard was needed.
                    self.local.remove(key);
                } else {
                    self.local.put_ready(key, rows.clone());
                }
                Ok(rows)
            }
            Err(err) => {
                self.local.remove(key);
                Err(err)
            }
        }
    }

    fn run_and_map(
        &mut self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
        handler: Option<&mut dyn RowHandler>,
    ) -> Result<Vec<DataObject>> {
        let timeout = self.effective_timeout(statement);
        let mut source = self
            .strategy
            .run_query(self.tx.as_mut(), statement, query, timeout)?;
        let mapper = Arc::clone(&self.mapper);
        match handler {
            None => mapper.map_rows(source.as_mut(), bounds, self),
            Some(handler) => {
                let mut skipped = 0;
                let mut handled = 0;
                while handled < bounds.limit {
                    match mapper.map_next(source.as_mut(), self)? {
                        Some(row) => {
                            if skipped < bounds.offset {
                                skipped += 1;
                                continue;
                            }
                            handled += 1;
                            if !handler.handle(&row)? {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                Ok(Vec::new())
            }
        }
    }

    fn drain_deferred(&mut self) -> Result<()> {
        while let Some(load) = self.deferred.pop_front() {
            trace!(property = %load.property(), "applying deferred load");
            load.load(&self.local, self.writer.as_ref())?;
        }
        Ok(())
    }

    fn shared_cache_for(&self, statement: &StatementInfo) -> Option<Arc<SharedCache>> {
        if !self.config.shared_cache_enabled {
            return None;
        }
        statement.cache.clone()
    }

    /// Statement timeout, else the session default, capped by the
    /// transaction timeout when one is set.
    fn effective_timeout(&self, statement: &StatementInfo) -> Option<Duration> {
        let statement_timeout = statement
            .timeout
            .or_else(|| self.config.default_timeout_ms.map(Duration::from_millis));
        match (statement_timeout, self.tx.timeout()) {
            (Some(own), Some(tx)) => Some(own.min(tx)),
            (own, tx) => own.or(tx),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(RowmapError::Closed);
        }
        Ok(())
    }
}

impl NestedLoader for Executor {
    fn create_cache_key(
        &self,
        statement: &StatementInfo,
        query: &BoundQuery,
        bounds: &RowBounds,
    ) -> Result<CacheKey> {
        Executor::create_cache_key(self, statement, query, bounds)
    }

    fn is_cached(&self, key: &CacheKey) -> bool {
        self.local.contains(key)
    }

    fn defer_load(
        &mut self,
        target: DataObject,
        property: &str,
        key: CacheKey,
        shape: ResultShape,
    ) -> Result<()> {
        self.ensure_open()?;
        let load = DeferredLoad::new(target, property, key, shape);
        if load.can_load(&self.local) {
            trace!(property = %load.property(), "deferred key already resolved, loading now");
            load.load(&self.local, self.writer.as_ref())
        } else {
            trace!(property = %load.property(), "queueing deferred load");
            self.deferred.push_back(load);
            Ok(())
        }
    }

    fn load_nested(
        &mut self,
        statement: &StatementInfo,
        query: BoundQuery,
        bounds: RowBounds,
        shape: ResultShape,
    ) -> Result<Value> {
        let rows = self.query(statement, query, bounds)?;
        extractor::extract(&rows, shape)
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("mode", &self.config.mode)
            .field("depth", &self.depth)
            .field("local_entries", &self.local.len())
            .field("deferred", &self.deferred.len())
            .field("closed", &self.closed)
            .finish()
    }
}

fn clamp_bound(bound: usize) -> i64 {
    bound.min(i64::MAX as usize) as i64
}
