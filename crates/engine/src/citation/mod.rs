//! Citation graph traversal
//!
//! Classifies the second-order citers of a focal entity into the
//! `b1f0`/`b1f1`/`b0f1` partition, reading the graph through a run-scoped
//! memoizing cache.

mod cache;
mod partition;

pub use cache::{CacheStats, MemoizingGraphCache};
pub use partition::PartitionComputer;
