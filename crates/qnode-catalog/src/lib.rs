//! Node-local metadata catalog of a query node.
//!
//! Tracks the collections, partitions and segments this node currently serves.
//! The catalog is a rebuildable cache fed by load/release instructions; it
//! holds identifiers and metadata only, never segment payloads.

pub mod collection;
pub mod metrics;
pub mod partition;
mod replica;
pub mod segment;
pub mod stats;

pub use collection::Collection;
pub use partition::Partition;
pub use replica::Replica;
pub use segment::Segment;
pub use stats::{CatalogStats, CollectionStats};
