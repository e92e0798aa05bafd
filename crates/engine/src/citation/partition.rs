//! Second-order citation partition

use citeindex_common::errors::{AppError, Result};
use citeindex_common::store::{CitationLookup, CitationSet, DateLookup};
use citeindex_common::types::{Direction, Partition};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Computes the `b1f0`/`b1f1`/`b0f1` partition of a focal entity.
///
/// Pure given its lookups; all reads go through `lookup`, normally a
/// [`super::MemoizingGraphCache`] shared by every worker of a run. Prior-art
/// citers and candidate dates are fetched with one bulk call each, so a
/// focal entity holds at most one backend request at a time however many
/// citations it has.
pub struct PartitionComputer<L: ?Sized> {
    lookup: Arc<L>,
}

impl<L> PartitionComputer<L>
where
    L: CitationLookup + DateLookup + ?Sized,
{
    pub fn new(lookup: Arc<L>) -> Self {
        Self { lookup }
    }

    /// Classify the second-order citers of `focal`.
    ///
    /// Fails with [`AppError::EntityNotFound`] when `focal` is unknown.
    #[instrument(skip(self))]
    pub async fn compute(&self, focal: &str) -> Result<Partition> {
        let backward = self.known_citations(focal, Direction::Backward).await?;
        let forward = self.known_citations(focal, Direction::Forward).await?;

        // Forward citers of every prior-art entity; unknown entities add nothing
        let prior_art: Vec<String> = backward.iter().cloned().collect();
        let citers_of_prior_art = self
            .lookup
            .citations_many(&prior_art, Direction::Forward)
            .await?;
        let forward_of_backward: HashSet<&String> = citers_of_prior_art
            .values()
            .flat_map(|set| set.iter())
            .collect();

        let mut b0f1 = BTreeSet::new();
        let mut b1f1 = BTreeSet::new();
        for citer in forward.iter().filter(|id| id.as_str() != focal) {
            if forward_of_backward.contains(citer) {
                b1f1.insert(citer.clone());
            } else {
                b0f1.insert(citer.clone());
            }
        }

        let candidates: Vec<String> = forward_of_backward
            .into_iter()
            .filter(|id| id.as_str() != focal && !forward.contains(*id))
            .cloned()
            .collect();
        let b1f0 = self.later_than_focal(focal, candidates).await?;

        debug!(
            b1f0 = b1f0.len(),
            b1f1 = b1f1.len(),
            b0f1 = b0f1.len(),
            "Partition computed"
        );

        Ok(Partition { b1f0, b1f1, b0f1 })
    }

    async fn known_citations(&self, focal: &str, direction: Direction) -> Result<CitationSet> {
        self.lookup
            .citations(focal, direction)
            .await?
            .ok_or_else(|| AppError::EntityNotFound {
                id: focal.to_string(),
            })
    }

    /// Keep candidates published strictly after the focal entity. With no
    /// focal date every candidate is kept; with one, undated candidates are
    /// dropped.
    async fn later_than_focal(
        &self,
        focal: &str,
        candidates: Vec<String>,
    ) -> Result<BTreeSet<String>> {
        let Some(focal_date) = self.lookup.publication_date(focal).await? else {
            return Ok(candidates.into_iter().collect());
        };

        let dates = self.lookup.publication_dates(&candidates).await?;

        Ok(candidates
            .into_iter()
            .filter(|id| dates.get(id).is_some_and(|date| *date > focal_date))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::MemoizingGraphCache;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use citeindex_common::store::{MemoryStore, PatentRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    /// F cites A and B and is cited by X and Y. A is cited by X and Z,
    /// B by Z and W. Z is published after F, W has no date.
    fn worked_example() -> MemoryStore {
        MemoryStore::with_patents([
            PatentRecord::new("F")
                .cites(["A", "B"])
                .cited_by(["X", "Y"])
                .dated(day(2005, 1)),
            PatentRecord::new("A").cited_by(["F", "X", "Z"]).dated(day(2000, 1)),
            PatentRecord::new("B").cited_by(["F", "Z", "W"]).dated(day(2001, 1)),
            PatentRecord::new("X").cites(["F", "A"]).dated(day(2007, 1)),
            PatentRecord::new("Y").cites(["F"]).dated(day(2008, 1)),
            PatentRecord::new("Z").cites(["A", "B"]).dated(day(2009, 1)),
            PatentRecord::new("W").cites(["B"]),
        ])
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_worked_example() {
        let computer = PartitionComputer::new(Arc::new(worked_example()));
        let partition = computer.compute("F").await.unwrap();

        assert_eq!(partition.b0f1, ids(&["Y"]));
        assert_eq!(partition.b1f1, ids(&["X"]));
        assert_eq!(partition.b1f0, ids(&["Z"]));
    }

    #[tokio::test]
    async fn test_unknown_focal_date_keeps_all_candidates() {
        let store = worked_example();
        store
            .insert(PatentRecord::new("F").cites(["A", "B"]).cited_by(["X", "Y"]))
            .await;
        let computer = PartitionComputer::new(Arc::new(store));
        let partition = computer.compute("F").await.unwrap();

        assert_eq!(partition.b1f0, ids(&["Z", "W"]));
    }

    #[tokio::test]
    async fn test_earlier_candidates_are_excluded() {
        let store = worked_example();
        store
            .insert(PatentRecord::new("Z").cites(["A", "B"]).dated(day(2004, 12)))
            .await;
        let computer = PartitionComputer::new(Arc::new(store));
        let partition = computer.compute("F").await.unwrap();

        assert!(partition.b1f0.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_focal_is_not_found() {
        let computer = PartitionComputer::new(Arc::new(worked_example()));
        let err = computer.compute("NOPE").await.unwrap_err();
        assert!(matches!(err, AppError::EntityNotFound { id } if id == "NOPE"));
    }

    #[tokio::test]
    async fn test_dangling_prior_art_contributes_nothing() {
        let store = MemoryStore::with_patents([
            PatentRecord::new("F").cites(["GHOST"]).cited_by(["Y"]),
            PatentRecord::new("Y").cites(["F"]),
        ]);
        let partition = PartitionComputer::new(Arc::new(store))
            .compute("F")
            .await
            .unwrap();

        assert_eq!(partition.b0f1, ids(&["Y"]));
        assert!(partition.b1f1.is_empty());
        assert!(partition.b1f0.is_empty());
    }

    #[tokio::test]
    async fn test_sets_are_disjoint_and_exclude_focal() {
        // F cites itself and is listed among its own citers
        let store = MemoryStore::with_patents([
            PatentRecord::new("F").cites(["F", "A"]).cited_by(["F", "X"]),
            PatentRecord::new("A").cited_by(["F", "X"]),
            PatentRecord::new("X").cites(["F", "A"]),
        ]);
        let partition = PartitionComputer::new(Arc::new(store))
            .compute("F")
            .await
            .unwrap();

        let all: Vec<&String> = partition
            .b1f0
            .iter()
            .chain(&partition.b1f1)
            .chain(&partition.b0f1)
            .collect();
        let unique: HashSet<&String> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        assert!(!unique.contains(&"F".to_string()));
        assert_eq!(partition.b1f1, ids(&["X"]));
    }

    #[tokio::test]
    async fn test_cached_recompute_reads_store_once() {
        let store = Arc::new(worked_example());
        let cache = Arc::new(MemoizingGraphCache::new(store.clone(), 0));
        let computer = PartitionComputer::new(cache.clone());

        let first = computer.compute("F").await.unwrap();
        let reads = store.citation_reads();
        let second = computer.compute("F").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.citation_reads(), reads);
        assert!(cache.stats().hits > 0);
    }

    /// Synthetic graph that tracks how many lookups are in flight at once
    #[derive(Default)]
    struct GaugeStore {
        prior_art: usize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GaugeStore {
        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CitationLookup for GaugeStore {
        async fn citations(&self, id: &str, direction: Direction) -> Result<Option<CitationSet>> {
            self.enter().await;
            let set: HashSet<String> = match (id, direction) {
                ("F", Direction::Backward) => {
                    (0..self.prior_art).map(|i| format!("P{i}")).collect()
                }
                ("F", Direction::Forward) => HashSet::new(),
                (prior, Direction::Forward) => [prior.replace('P', "C")].into(),
                (_, Direction::Backward) => HashSet::new(),
            };
            Ok(Some(Arc::new(set)))
        }
    }

    #[async_trait]
    impl DateLookup for GaugeStore {
        async fn publication_date(&self, id: &str) -> Result<Option<NaiveDate>> {
            self.enter().await;
            Ok(Some(if id == "F" { day(2000, 1) } else { day(2001, 1) }))
        }
    }

    #[tokio::test]
    async fn test_heavily_cited_prior_art_keeps_lookups_bounded() {
        let store = Arc::new(GaugeStore {
            prior_art: 2000,
            ..Default::default()
        });
        let computer = PartitionComputer::new(store.clone());
        let partition = computer.compute("F").await.unwrap();

        assert_eq!(partition.b1f0.len(), 2000);
        assert!(partition.b1f0.contains("C1999"));
        assert_eq!(store.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_partition_uses_bulk_reads() {
        let store = Arc::new(GaugeStore {
            prior_art: 500,
            ..Default::default()
        });
        let cache = Arc::new(MemoizingGraphCache::new(store.clone(), 0));
        let partition = PartitionComputer::new(cache).compute("F").await.unwrap();

        assert_eq!(partition.b1f0.len(), 500);
        assert_eq!(store.peak.load(Ordering::SeqCst), 1);
    }
}
