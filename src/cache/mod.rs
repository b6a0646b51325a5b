//! Cache Module
//!
//! Origin-scoped response storage: named cache generations with FIFO
//! insertion tracking, a shared storage container and durable snapshots.

mod entry;
mod fifo;
mod request;
mod response;
pub mod snapshot;
mod stats;
mod storage;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use fifo::InsertionOrder;
pub use request::{Destination, FetchRequest, RequestKey};
pub use response::{FetchResponse, ResponseKind};
pub use stats::CacheStats;
pub use storage::{CacheStorage, SharedStorage};
pub use store::NamedCache;

// == Public Constants ==
/// Default bound on the number of dynamic cache entries
pub const DEFAULT_MAX_DYNAMIC_ENTRIES: usize = 50;
