//! In-process implementation of the collaborator traits
//!
//! Holds the whole population in ordered maps. Used for tests and small
//! offline runs; commits can be made to fail on demand to exercise the
//! orchestrator's recovery paths.

use super::{CitationLookup, CitationSet, DateLookup, EntityStore};
use crate::errors::{AppError, Result};
use crate::types::{
    Direction, IndexCandidate, IndexName, IndexRecord, IndexValues, PairKey, PairSimilarity,
    Partition, PartitionRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One patent as held by the in-memory store
#[derive(Debug, Clone, Default)]
pub struct PatentRecord {
    pub id: String,
    pub publication_date: Option<NaiveDate>,
    pub abstract_text: String,
    pub backward: HashSet<String>,
    pub forward: HashSet<String>,
    pub listed_company: bool,
}

impl PatentRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    pub fn cites<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backward.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn cited_by<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forward.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn listed(mut self) -> Self {
        self.listed_company = true;
        self
    }
}

#[derive(Default)]
struct Tables {
    patents: BTreeMap<String, PatentRecord>,
    partitions: BTreeMap<String, Partition>,
    indices: BTreeMap<String, IndexValues>,
    pairs: HashMap<PairKey, f64>,
}

/// In-memory entity store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing_commits: AtomicU32,
    commits_before_failure: AtomicU32,
    citation_reads: AtomicUsize,
    date_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a set of patents
    pub fn with_patents(patents: impl IntoIterator<Item = PatentRecord>) -> Self {
        let mut store = Self::new();
        {
            let tables = store.tables.get_mut();
            for patent in patents {
                tables.patents.insert(patent.id.clone(), patent);
            }
        }
        store
    }

    pub async fn insert(&self, patent: PatentRecord) {
        self.tables.write().await.patents.insert(patent.id.clone(), patent);
    }

    /// Make the next `count` page commits fail with a transaction error
    pub fn fail_next_commits(&self, count: u32) {
        self.fail_commits_after(0, count);
    }

    /// Let `successes` page commits through, then fail the next `count`
    pub fn fail_commits_after(&self, successes: u32, count: u32) {
        self.commits_before_failure.store(successes, Ordering::SeqCst);
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of citation reads served so far
    pub fn citation_reads(&self) -> usize {
        self.citation_reads.load(Ordering::SeqCst)
    }

    /// Number of date reads served so far
    pub fn date_reads(&self) -> usize {
        self.date_reads.load(Ordering::SeqCst)
    }

    pub async fn partition(&self, id: &str) -> Option<Partition> {
        self.tables.read().await.partitions.get(id).cloned()
    }

    pub async fn partition_count(&self) -> usize {
        self.tables.read().await.partitions.len()
    }

    pub async fn index_values(&self, id: &str) -> Option<IndexValues> {
        self.tables.read().await.indices.get(id).copied()
    }

    pub async fn pair_score(&self, a: &str, b: &str) -> Option<f64> {
        self.tables.read().await.pairs.get(&PairKey::new(a, b)).copied()
    }

    pub async fn pair_count(&self) -> usize {
        self.tables.read().await.pairs.len()
    }

    fn take_commit_failure(&self) -> Result<()> {
        if self.failing_commits.load(Ordering::SeqCst) == 0 {
            return Ok(());
        }
        let allowed = self
            .commits_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if allowed {
            return Ok(());
        }

        let injected = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::Transaction {
                message: "injected commit failure".to_string(),
            });
        }
        Ok(())
    }
}

fn after_cursor(id: &str, cursor: Option<&str>) -> bool {
    cursor.map_or(true, |c| id > c)
}

#[async_trait]
impl CitationLookup for MemoryStore {
    async fn citations(&self, id: &str, direction: Direction) -> Result<Option<CitationSet>> {
        self.citation_reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().await;
        Ok(tables.patents.get(id).map(|p| match direction {
            Direction::Forward => Arc::new(p.forward.clone()),
            Direction::Backward => Arc::new(p.backward.clone()),
        }))
    }
}

#[async_trait]
impl DateLookup for MemoryStore {
    async fn publication_date(&self, id: &str) -> Result<Option<NaiveDate>> {
        self.date_reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().await;
        Ok(tables.patents.get(id).and_then(|p| p.publication_date))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn unresolved_partitions(
        &self,
        cursor: Option<&str>,
        limit: u64,
        listed_only: bool,
    ) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .patents
            .values()
            .filter(|p| after_cursor(&p.id, cursor))
            .filter(|p| !listed_only || p.listed_company)
            .filter(|p| !tables.partitions.contains_key(&p.id))
            .take(limit as usize)
            .map(|p| p.id.clone())
            .collect())
    }

    async fn unresolved_indices(
        &self,
        cursor: Option<&str>,
        limit: u64,
        fields: &BTreeSet<IndexName>,
    ) -> Result<Vec<IndexCandidate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .partitions
            .iter()
            .filter(|(id, _)| after_cursor(id, cursor))
            .filter_map(|(id, partition)| {
                let existing = tables.indices.get(id).copied().unwrap_or_default();
                existing.missing(fields).next()?;
                Some(IndexCandidate {
                    partition: PartitionRecord {
                        focal: id.clone(),
                        partition: partition.clone(),
                    },
                    existing,
                })
            })
            .take(limit as usize)
            .collect())
    }

    async fn abstracts(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                tables
                    .patents
                    .get(id)
                    .map(|p| (id.clone(), p.abstract_text.clone()))
            })
            .collect())
    }

    async fn pair_scores(&self, pairs: &[PairKey]) -> Result<HashMap<PairKey, f64>> {
        let tables = self.tables.read().await;
        Ok(pairs
            .iter()
            .filter_map(|key| tables.pairs.get(key).map(|score| (key.clone(), *score)))
            .collect())
    }

    async fn commit_partition_page(&self, rows: Vec<PartitionRecord>) -> Result<()> {
        self.take_commit_failure()?;
        let mut tables = self.tables.write().await;
        for row in rows {
            // Append-only: an existing partition is never replaced
            tables.partitions.entry(row.focal).or_insert(row.partition);
        }
        Ok(())
    }

    async fn commit_index_page(
        &self,
        pairs: Vec<PairSimilarity>,
        rows: Vec<IndexRecord>,
    ) -> Result<()> {
        self.take_commit_failure()?;
        let mut tables = self.tables.write().await;
        for pair in pairs {
            tables.pairs.entry(pair.key).or_insert(pair.score);
        }
        for row in rows {
            tables
                .indices
                .entry(row.focal)
                .or_default()
                .fill_from(&row.values);
        }
        Ok(())
    }

    async fn missing_citations(&self, cursor: Option<&str>, limit: u64) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let missing: BTreeSet<&String> = tables
            .patents
            .values()
            .flat_map(|p| p.backward.iter().chain(p.forward.iter()))
            .filter(|id| !tables.patents.contains_key(*id))
            .collect();
        Ok(missing
            .into_iter()
            .filter(|id| after_cursor(id, cursor))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
