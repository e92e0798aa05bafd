//! CiteIndex Engine
//!
//! Computes second-order citation partitions and the CD family of
//! disruption indices over a citation graph:
//! - `citation`: memoized graph lookups and the partition computer
//! - `index`: closed-form index formulas and per-entity evaluation
//! - `pairs`: deduplicated pairwise similarity resolution
//! - `batch`: resumable, page-committed batch orchestration

pub mod batch;
pub mod citation;
pub mod errors;
pub mod index;
pub mod pairs;

pub use batch::{BatchOrchestrator, BatchParams, RunReport};
pub use citation::{MemoizingGraphCache, PartitionComputer};
pub use errors::BatchError;
pub use index::IndexEngine;
pub use pairs::{PairDeduplicator, PairScores};
