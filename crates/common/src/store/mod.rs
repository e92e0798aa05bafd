//! Collaborator traits consumed by the engine
//!
//! The engine never talks to a database directly; it reads citations, dates
//! and abstracts through these traits and hands finished pages back to the
//! store. `Repository` implements them over SeaORM, `MemoryStore` over
//! in-process maps.

mod memory;

pub use memory::{MemoryStore, PatentRecord};

use crate::errors::Result;
use crate::types::{
    Direction, IndexCandidate, IndexName, IndexRecord, PairKey, PairSimilarity, PartitionRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Shared, immutable set of citation ids
pub type CitationSet = Arc<HashSet<String>>;

/// Read access to the citation graph
#[async_trait]
pub trait CitationLookup: Send + Sync {
    /// Directly citing/cited ids; `None` when the entity is unknown
    async fn citations(&self, id: &str, direction: Direction) -> Result<Option<CitationSet>>;

    /// Citation sets for many ids; unknown ids are absent from the map.
    ///
    /// The default issues one lookup at a time, so a caller never holds more
    /// than one backend request per invocation.
    async fn citations_many(
        &self,
        ids: &[String],
        direction: Direction,
    ) -> Result<HashMap<String, CitationSet>> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(set) = self.citations(id, direction).await? {
                found.insert(id.clone(), set);
            }
        }
        Ok(found)
    }
}

/// Read access to publication dates
#[async_trait]
pub trait DateLookup: Send + Sync {
    /// Publication date; `None` when unknown or the entity does not exist
    async fn publication_date(&self, id: &str) -> Result<Option<NaiveDate>>;

    /// Known publication dates for many ids; undated and unknown ids are
    /// absent from the map. Sequential by default.
    async fn publication_dates(&self, ids: &[String]) -> Result<HashMap<String, NaiveDate>> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(date) = self.publication_date(id).await? {
                found.insert(id.clone(), date);
            }
        }
        Ok(found)
    }
}

/// Population scans and page-level persistence
#[async_trait]
pub trait EntityStore: CitationLookup + DateLookup {
    /// Focal ids after `cursor` (ascending) that have no partition result yet
    async fn unresolved_partitions(
        &self,
        cursor: Option<&str>,
        limit: u64,
        listed_only: bool,
    ) -> Result<Vec<String>>;

    /// Partitioned focal entities after `cursor` with at least one of
    /// `fields` still null
    async fn unresolved_indices(
        &self,
        cursor: Option<&str>,
        limit: u64,
        fields: &BTreeSet<IndexName>,
    ) -> Result<Vec<IndexCandidate>>;

    /// Abstracts for the given ids; unknown ids are absent from the map
    async fn abstracts(&self, ids: &[String]) -> Result<HashMap<String, String>>;

    /// Stored scores for whichever of `pairs` already have one
    async fn pair_scores(&self, pairs: &[PairKey]) -> Result<HashMap<PairKey, f64>>;

    /// Persist one page of partition results atomically
    async fn commit_partition_page(&self, rows: Vec<PartitionRecord>) -> Result<()>;

    /// Persist one page of pair scores and partial index updates atomically
    async fn commit_index_page(
        &self,
        pairs: Vec<PairSimilarity>,
        rows: Vec<IndexRecord>,
    ) -> Result<()>;

    /// Ids referenced by citation lists but absent from the entity table
    async fn missing_citations(&self, cursor: Option<&str>, limit: u64) -> Result<Vec<String>>;
}

/// Split a stored comma separated id list
pub fn split_ids(raw: Option<&str>) -> HashSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Join ids into the stored comma separated form
pub fn join_ids<'a>(ids: impl IntoIterator<Item = &'a String>) -> String {
    ids.into_iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
