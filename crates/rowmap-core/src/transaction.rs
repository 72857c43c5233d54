//! Transaction contract consumed by the executor

use std::sync::Arc;
use std::time::Duration;

use crate::driver::Connection;
use crate::error::Result;

/// One database transaction owning its connection.
///
/// The executor drives this contract; it never commits or rolls back behind
/// the caller's back. `connection` may open lazily on first use.
pub trait Transaction: Send {
    /// Connection used to prepare statement handles
    fn connection(&mut self) -> Result<Arc<dyn Connection>>;

    /// Commit the underlying transaction
    fn commit(&mut self) -> Result<()>;

    /// Roll back the underlying transaction
    fn rollback(&mut self) -> Result<()>;

    /// Release the transaction and its connection
    fn close(&mut self) -> Result<()>;

    /// Transaction-level statement timeout, if any
    fn timeout(&self) -> Option<Duration> {
        None
    }
}
