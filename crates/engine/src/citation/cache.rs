//! Run-scoped memo over citation and date lookups

use citeindex_common::metrics::record_cache;
use citeindex_common::store::{CitationLookup, CitationSet, DateLookup};
use citeindex_common::types::Direction;
use citeindex_common::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hit/miss counters for one cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizing decorator over [`CitationLookup`] and [`DateLookup`].
///
/// Created once per orchestrator run and dropped with it. Unknown entities
/// are memoized as unknown. When `capacity` is non-zero and the memo is
/// full, further misses are read through without being stored. Two workers
/// missing the same key at once both read the inner store; the second
/// insert is a no-op.
pub struct MemoizingGraphCache<L: ?Sized> {
    inner: Arc<L>,
    citations: DashMap<(String, Direction), Option<CitationSet>>,
    dates: DashMap<String, Option<NaiveDate>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<L> MemoizingGraphCache<L>
where
    L: CitationLookup + DateLookup + ?Sized,
{
    /// `capacity == 0` means unbounded
    pub fn new(inner: Arc<L>, capacity: usize) -> Self {
        Self {
            inner,
            citations: DashMap::new(),
            dates: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Number of memoized entries across both maps
    pub fn len(&self) -> usize {
        self.citations.len() + self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_room(&self) -> bool {
        self.capacity == 0 || self.len() < self.capacity
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        record_cache(true);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        record_cache(false);
    }
}

#[async_trait]
impl<L> CitationLookup for MemoizingGraphCache<L>
where
    L: CitationLookup + DateLookup + ?Sized,
{
    async fn citations(&self, id: &str, direction: Direction) -> Result<Option<CitationSet>> {
        let key = (id.to_string(), direction);
        if let Some(entry) = self.citations.get(&key) {
            self.hit();
            return Ok(entry.value().clone());
        }

        self.miss();
        let fetched = self.inner.citations(id, direction).await?;
        if self.has_room() {
            self.citations.entry(key).or_insert_with(|| fetched.clone());
        }
        Ok(fetched)
    }

    /// Serves memoized ids directly and fetches the rest in one bulk read
    async fn citations_many(
        &self,
        ids: &[String],
        direction: Direction,
    ) -> Result<HashMap<String, CitationSet>> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match self.citations.get(&(id.clone(), direction)) {
                Some(entry) => {
                    self.hit();
                    if let Some(set) = entry.value() {
                        found.insert(id.clone(), set.clone());
                    }
                }
                None => missing.push(id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        missing.iter().for_each(|_| self.miss());
        let fetched = self.inner.citations_many(&missing, direction).await?;
        for id in missing {
            let set = fetched.get(&id).cloned();
            if self.has_room() {
                self.citations
                    .entry((id.clone(), direction))
                    .or_insert_with(|| set.clone());
            }
            if let Some(set) = set {
                found.insert(id, set);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl<L> DateLookup for MemoizingGraphCache<L>
where
    L: CitationLookup + DateLookup + ?Sized,
{
    async fn publication_date(&self, id: &str) -> Result<Option<NaiveDate>> {
        if let Some(entry) = self.dates.get(id) {
            self.hit();
            return Ok(*entry.value());
        }

        self.miss();
        let fetched = self.inner.publication_date(id).await?;
        if self.has_room() {
            self.dates.entry(id.to_string()).or_insert(fetched);
        }
        Ok(fetched)
    }

    async fn publication_dates(&self, ids: &[String]) -> Result<HashMap<String, NaiveDate>> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match self.dates.get(id) {
                Some(entry) => {
                    self.hit();
                    if let Some(date) = *entry.value() {
                        found.insert(id.clone(), date);
                    }
                }
                None => missing.push(id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        missing.iter().for_each(|_| self.miss());
        let fetched = self.inner.publication_dates(&missing).await?;
        for id in missing {
            let date = fetched.get(&id).copied();
            if self.has_room() {
                self.dates.entry(id.clone()).or_insert(date);
            }
            if let Some(date) = date {
                found.insert(id, date);
            }
        }
        Ok(found)
    }
}
