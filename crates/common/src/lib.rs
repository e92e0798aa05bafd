//! CiteIndex Common Library
//!
//! Shared code for the CiteIndex engine and worker including:
//! - Domain types (partitions, index values, similarity pairs)
//! - Collaborator traits for citation, date and result storage
//! - Database models and the SeaORM-backed repository
//! - Similarity scoring clients
//! - Error types, configuration and metrics

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod similarity;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use similarity::SimilarityScorer;
pub use store::{CitationLookup, DateLookup, EntityStore, MemoryStore};
pub use types::{Direction, IndexName, IndexValues, PairKey, Partition};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default similarity endpoint path
pub const DEFAULT_SIMILARITY_PATH: &str = "/similarity";
