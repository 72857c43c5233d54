//! Rowmap Exec - unit-of-work execution over the rowmap caching machinery
//!
//! An `Executor` is one unit of work: it owns a transaction, a local
//! result cache following the placeholder protocol, a deferred-load queue
//! drained when query nesting returns to depth zero, and staged views of
//! the shared caches its statements participate in. Three interchangeable
//! strategies control statement-handle lifecycle: `DirectStrategy`
//! prepares per call, `ReuseStrategy` keeps handles per SQL text, and
//! `BatchStrategy` accumulates adjacent writes into batch groups executed
//! at flush. `QueryCursor` streams rows outside the caches and `LazyValue`
//! defers an association until first access.

mod config;
mod cursor;
mod deferred;
mod executor;
mod extractor;
mod lazy;
mod local;
mod mapper;
mod staged;
mod statement;
mod strategy;

#[cfg(test)]
mod test_support;

pub use config::{ExecMode, LocalCacheScope, SessionConfig};
pub use cursor::QueryCursor;
pub use deferred::DeferredLoad;
pub use executor::Executor;
pub use extractor::{ResultShape, extract, single};
pub use lazy::LazyValue;
pub use local::{CacheEntry, LocalCache};
pub use mapper::{NestedLoader, ObjectMapper, RowHandler, RowMapper};
pub use statement::StatementInfo;
pub use strategy::{
    BATCH_PENDING_ROWS, BatchStrategy, DirectStrategy, ExecStrategy, ReuseStrategy,
};
