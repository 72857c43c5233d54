//! Store decorators composed by the cache builder
//!
//! Chain order (innermost first): base store, eviction policies in declared
//! order, interval flush, serialization isolation, statistics. The
//! synchronization and blocking layers live in `SharedCache` itself.

mod fifo;
mod interval;
mod lru;
mod serialized;
mod stats;
mod two_tier;

pub use fifo::FifoPolicy;
pub use interval::IntervalFlush;
pub use lru::LruPolicy;
pub use serialized::Serialized;
pub use stats::StatsLayer;
pub use two_tier::TwoTierPolicy;
