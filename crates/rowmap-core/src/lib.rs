//! Rowmap Core - shared value model and contracts for the rowmap engine
//!
//! This crate provides the fundamental types and traits the other rowmap
//! crates depend on. It defines:
//!
//! - `Value`, `Row`, `DataObject` - the value model results are mapped into
//! - `BoundQuery`, `RowBounds`, `BatchResult` - statement vocabulary
//! - `Connection`, `StatementHandle`, `RowSource` - driver contracts
//! - `Transaction` - transaction contract
//! - `PropertyWriter` - property-assignment contract used by deferred loads
//! - `RowmapError` / `Result` - the crate-wide error type

mod driver;
mod error;
mod property;
mod statement;
mod transaction;
mod types;

pub use driver::*;
pub use error::*;
pub use property::*;
pub use statement::*;
pub use transaction::*;
pub use types::*;
