//! SQLite driver for the rowmap persistence engine
//!
//! Implements the `rowmap-core` driver contracts over rusqlite: a shared
//! connection behind a mutex, statement handles that go through rusqlite's
//! prepared-statement cache, and a raw-SQL transaction wrapper. Column
//! decoding honours declared types, so `BOOLEAN`, `DATE`, `DATETIME`,
//! `JSON` and `UUID` columns come back as typed values rather than the
//! storage classes SQLite keeps them in.

mod connection;
mod statement;
mod transaction;
mod values;

pub use connection::SqliteConnection;
pub use statement::SqliteStatement;
pub use transaction::SqliteTransaction;
