//! Resumable batch orchestration
//!
//! Each phase pages through unresolved focal entities in ascending id order,
//! computes a page with bounded parallelism and commits it in a single
//! transaction. The cursor is the last id of the previous page, so entities
//! that failed or were skipped are not revisited within a run, and a restart
//! picks up exactly the entities that are still unresolved.

mod report;

pub use report::RunReport;

use crate::citation::{MemoizingGraphCache, PartitionComputer};
use crate::errors::BatchError;
use crate::index::IndexEngine;
use crate::pairs::{PairDeduplicator, PairScores};
use backoff::ExponentialBackoff;
use citeindex_common::config::BatchConfig;
use citeindex_common::errors::AppError;
use citeindex_common::metrics::{record_commit, record_entity};
use citeindex_common::similarity::SimilarityScorer;
use citeindex_common::store::EntityStore;
use citeindex_common::types::{
    IndexCandidate, IndexName, IndexRecord, Partition, PartitionRecord, Phase,
};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Parameters of one index run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchParams {
    pub batch_size: u64,
    pub indices: BTreeSet<IndexName>,
}

impl BatchParams {
    pub fn new(batch_size: u64, indices: impl IntoIterator<Item = IndexName>) -> Self {
        Self {
            batch_size,
            indices: indices.into_iter().collect(),
        }
    }

    /// Parse a comma separated index list such as `cd_t,cd_f3_t`
    pub fn parse(batch_size: u64, index_names: &str) -> Result<Self, BatchError> {
        let params = Self {
            batch_size,
            indices: IndexName::parse_list(index_names)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.batch_size == 0 {
            return Err(BatchError::ConfigError(
                "batch size must be positive".to_string(),
            ));
        }
        if self.indices.is_empty() {
            return Err(BatchError::ConfigError(
                "at least one index name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Drives the partition and index phases over an [`EntityStore`]
pub struct BatchOrchestrator<S: ?Sized> {
    store: Arc<S>,
    scorer: Arc<dyn SimilarityScorer>,
    config: BatchConfig,
    similarity_concurrency: usize,
    engine: IndexEngine,
}

impl<S> BatchOrchestrator<S>
where
    S: EntityStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        scorer: Arc<dyn SimilarityScorer>,
        config: BatchConfig,
        similarity_concurrency: usize,
    ) -> Result<Self, BatchError> {
        config.validate()?;
        if similarity_concurrency == 0 {
            return Err(BatchError::ConfigError(
                "similarity concurrency must be positive".to_string(),
            ));
        }

        Ok(Self {
            store,
            scorer,
            config,
            similarity_concurrency,
            engine: IndexEngine::new(),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run both phases, partitions first
    pub async fn run(&self, params: &BatchParams) -> Result<Vec<RunReport>, BatchError> {
        params.validate()?;
        let partitions = self.run_partitions(params.batch_size).await?;
        let indices = self.run_indices(params).await?;
        Ok(vec![partitions, indices])
    }

    /// Compute and persist partitions for every unresolved focal entity
    #[instrument(skip(self))]
    pub async fn run_partitions(&self, batch_size: u64) -> Result<RunReport, BatchError> {
        if batch_size == 0 {
            return Err(BatchError::ConfigError(
                "batch size must be positive".to_string(),
            ));
        }

        let cache = Arc::new(MemoizingGraphCache::new(
            self.store.clone(),
            self.config.cache_capacity,
        ));
        let computer = PartitionComputer::new(cache.clone());
        let listed_only = self.config.listed_only;
        let mut report = RunReport::new(Phase::Partition);
        let mut cursor: Option<String> = None;

        info!(batch_size, listed_only, "Starting partition phase");

        loop {
            let ids = self
                .with_storage_retry("fetch partition page", || {
                    self.store
                        .unresolved_partitions(cursor.as_deref(), batch_size, listed_only)
                })
                .await?;
            let Some(last) = ids.last().cloned() else {
                break;
            };

            self.partition_page(&computer, ids, &mut report).await?;
            cursor = Some(last);
        }

        let stats = cache.stats();
        report.cache_hits = stats.hits;
        report.cache_misses = stats.misses;

        info!(
            pages = report.pages,
            resolved = report.resolved,
            skipped = report.skipped,
            failed = report.failed,
            cache_hits = report.cache_hits,
            cache_misses = report.cache_misses,
            "Partition phase completed"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(page = report.pages + 1, size = ids.len()))]
    async fn partition_page(
        &self,
        computer: &PartitionComputer<MemoizingGraphCache<S>>,
        ids: Vec<String>,
        report: &mut RunReport,
    ) -> Result<(), BatchError> {
        let results: Vec<(String, Result<Partition, AppError>)> = stream::iter(ids)
            .map(|focal| async move {
                let result = computer.compute(&focal).await;
                (focal, result)
            })
            .buffer_unordered(self.config.worker_concurrency)
            .collect()
            .await;

        let mut rows = Vec::with_capacity(results.len());
        for (focal, result) in results {
            match result {
                Ok(partition) => rows.push(PartitionRecord { focal, partition }),
                Err(AppError::EntityNotFound { .. }) => {
                    warn!(focal = %focal, "Focal entity not found, skipping");
                    record_entity(Phase::Partition.as_str(), "skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(focal = %focal, error = %e, "Partition failed");
                    record_entity(Phase::Partition.as_str(), "failed");
                    report.failed += 1;
                }
            }
        }
        rows.sort_by(|a, b| a.focal.cmp(&b.focal));

        let start = Instant::now();
        self.with_storage_retry("commit partition page", || {
            self.store.commit_partition_page(rows.clone())
        })
        .await?;
        record_commit(Phase::Partition.as_str(), start.elapsed().as_secs_f64());

        for _ in &rows {
            record_entity(Phase::Partition.as_str(), "resolved");
        }
        report.resolved += rows.len();
        report.pages += 1;

        debug!(committed = rows.len(), "Partition page committed");
        Ok(())
    }

    /// Compute and persist every requested index that is still null
    #[instrument(skip(self, params), fields(indices = ?params.indices))]
    pub async fn run_indices(&self, params: &BatchParams) -> Result<RunReport, BatchError> {
        params.validate()?;

        let dedup = PairDeduplicator::new(
            self.store.clone(),
            self.scorer.clone(),
            self.similarity_concurrency,
        );
        let mut report = RunReport::new(Phase::Index);
        let mut cursor: Option<String> = None;

        info!(
            batch_size = params.batch_size,
            provider = self.scorer.provider_name(),
            "Starting index phase"
        );

        loop {
            let candidates = self
                .with_storage_retry("fetch index page", || {
                    self.store.unresolved_indices(
                        cursor.as_deref(),
                        params.batch_size,
                        &params.indices,
                    )
                })
                .await?;
            let Some(last) = candidates.last().map(|c| c.partition.focal.clone()) else {
                break;
            };

            self.index_page(&dedup, params, candidates, &mut report).await?;
            cursor = Some(last);
        }

        info!(
            pages = report.pages,
            resolved = report.resolved,
            failed = report.failed,
            similarity_calls = report.similarity_calls,
            pairs_written = report.pairs_written,
            "Index phase completed"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(page = report.pages + 1, size = candidates.len()))]
    async fn index_page(
        &self,
        dedup: &PairDeduplicator<S>,
        params: &BatchParams,
        candidates: Vec<IndexCandidate>,
        report: &mut RunReport,
    ) -> Result<(), BatchError> {
        // Only entities still missing a similarity-weighted index need pairs
        let awaiting_pairs: Vec<&PartitionRecord> = candidates
            .iter()
            .filter(|c| {
                c.existing
                    .missing(&params.indices)
                    .any(|name| name.needs_similarity())
            })
            .map(|c| &c.partition)
            .collect();

        let mut scores = if awaiting_pairs.is_empty() {
            Some(PairScores::default())
        } else {
            match dedup.resolve(&awaiting_pairs).await {
                Ok(scores) => Some(scores),
                Err(e) => {
                    error!(error = %e, "Failed to resolve similarity pairs for page");
                    None
                }
            }
        };

        let mut rows = Vec::new();
        for candidate in &candidates {
            let outcome = self
                .engine
                .evaluate(candidate, &params.indices, scores.as_ref());
            report.record_outcome(&outcome);
            let status = if outcome.is_failed() { "failed" } else { "resolved" };
            record_entity(Phase::Index.as_str(), status);

            if !outcome.values.is_empty() {
                rows.push(IndexRecord {
                    focal: candidate.partition.focal.clone(),
                    values: outcome.values,
                });
            }
        }

        let pairs = scores.as_mut().map(PairScores::take_fresh).unwrap_or_default();
        report.similarity_calls += scores.as_ref().map_or(0, PairScores::calls);

        if !rows.is_empty() || !pairs.is_empty() {
            let start = Instant::now();
            self.with_storage_retry("commit index page", || {
                self.store.commit_index_page(pairs.clone(), rows.clone())
            })
            .await?;
            record_commit(Phase::Index.as_str(), start.elapsed().as_secs_f64());
        }

        report.pairs_written += pairs.len();
        report.pages += 1;

        debug!(rows = rows.len(), pairs = pairs.len(), "Index page committed");
        Ok(())
    }

    /// Run a storage operation, retrying transient failures with exponential
    /// backoff until `commit_max_elapsed` runs out. Exhaustion is fatal.
    async fn with_storage_retry<T, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<T, BatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let max_elapsed = self.config.commit_max_elapsed();
        if max_elapsed.is_zero() {
            return op().await.map_err(|e| BatchError::storage(operation, e));
        }

        let policy = ExponentialBackoff {
            current_interval: Duration::from_millis(100),
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(max_elapsed),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || {
            let attempt = op();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_transient() {
                        warn!(operation, error = %e, "Storage operation failed, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
        .map_err(|e| {
            error!(operation, error = %e, "Storage operation failed permanently");
            BatchError::storage(operation, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use citeindex_common::store::{
        CitationLookup, CitationSet, DateLookup, MemoryStore, PatentRecord,
    };
    use citeindex_common::types::{Direction, IndexValues, PairKey, PairSimilarity};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const IDS: [&str; 9] = ["A", "B", "F", "ORPHAN", "V", "W", "X", "Y", "Z"];

    #[derive(Default)]
    struct CountingScorer {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingScorer {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SimilarityScorer for CountingScorer {
        async fn score(&self, _: &str, _: &str) -> citeindex_common::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::SimilarityTimeout { timeout_ms: 5000 });
            }
            Ok(0.5)
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    fn day(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 6, 1).unwrap()
    }

    /// F: b0f1 = {Y, V}, b1f1 = {X}, b1f0 = {Z}; ORPHAN has no citations
    fn population() -> Vec<PatentRecord> {
        vec![
            PatentRecord::new("F")
                .cites(["A", "B"])
                .cited_by(["X", "Y", "V"])
                .dated(day(2005))
                .with_abstract("rotor blade assembly")
                .listed(),
            PatentRecord::new("A").cited_by(["F", "X", "Z"]).dated(day(2000)),
            PatentRecord::new("B").cited_by(["F", "Z", "W"]).dated(day(2001)),
            PatentRecord::new("X")
                .cites(["F", "A"])
                .dated(day(2007))
                .with_abstract("rotor hub assembly"),
            PatentRecord::new("Y")
                .cites(["F"])
                .dated(day(2008))
                .with_abstract("blade pitch control"),
            PatentRecord::new("V")
                .cites(["F"])
                .dated(day(2006))
                .with_abstract("variable pitch rotor"),
            PatentRecord::new("Z").cites(["A", "B"]).dated(day(2009)),
            PatentRecord::new("W").cites(["B"]),
            PatentRecord::new("ORPHAN").dated(day(2010)),
        ]
    }

    fn config() -> BatchConfig {
        BatchConfig {
            batch_size: 3,
            worker_concurrency: 4,
            cache_capacity: 0,
            listed_only: false,
            commit_max_elapsed_secs: 0,
        }
    }

    fn orchestrator<S: EntityStore + ?Sized>(
        store: Arc<S>,
        scorer: Arc<CountingScorer>,
        config: BatchConfig,
    ) -> BatchOrchestrator<S> {
        BatchOrchestrator::new(store, scorer, config, 4).unwrap()
    }

    fn all_indices() -> BatchParams {
        BatchParams::new(3, IndexName::ALL)
    }

    async fn snapshot(store: &MemoryStore) -> Vec<(Option<Partition>, Option<IndexValues>)> {
        let mut rows = Vec::new();
        for id in IDS {
            rows.push((store.partition(id).await, store.index_values(id).await));
        }
        rows
    }

    fn close(actual: Option<f64>, expected: f64) {
        let value = actual.expect("index should be defined");
        assert!((value - expected).abs() < 1e-12, "{} != {}", value, expected);
    }

    #[tokio::test]
    async fn test_full_run_computes_every_index() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let scorer = Arc::new(CountingScorer::default());
        let reports = orchestrator(store.clone(), scorer.clone(), config())
            .run(&all_indices())
            .await
            .unwrap();

        assert_eq!(reports[0].resolved, IDS.len());
        assert_eq!(reports[0].pages, 3);
        assert!(reports[0].cache_hits > 0);

        let values = store.index_values("F").await.unwrap();
        close(values.cd_t, 0.25);
        close(values.cd_f_t, 0.25);
        close(values.cd_f2_t, 0.75);
        close(values.cd_f3_t, 0.375);

        // (F, X), (F, Y), (F, V); every other focal entity lacks abstracts
        assert_eq!(scorer.calls(), 3);
        assert_eq!(reports[1].similarity_calls, 3);
        assert_eq!(reports[1].pairs_written, 3);
        assert_eq!(store.pair_score("X", "F").await, Some(0.5));
    }

    #[tokio::test]
    async fn test_empty_partition_leaves_indices_undefined() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let scorer = Arc::new(CountingScorer::default());
        let reports = orchestrator(store.clone(), scorer, config())
            .run(&all_indices())
            .await
            .unwrap();

        assert_eq!(store.partition("ORPHAN").await, Some(Partition::default()));
        assert!(store.index_values("ORPHAN").await.is_none());
        for name in IndexName::ALL {
            assert!(reports[1].undefined_for(name) >= 1);
        }
    }

    #[tokio::test]
    async fn test_second_run_is_a_noop() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let scorer = Arc::new(CountingScorer::default());
        let orchestrator = orchestrator(store.clone(), scorer.clone(), config());

        orchestrator.run(&all_indices()).await.unwrap();
        let first = snapshot(&store).await;
        let calls = scorer.calls();

        let reports = orchestrator.run(&all_indices()).await.unwrap();

        assert_eq!(snapshot(&store).await, first);
        assert_eq!(scorer.calls(), calls);
        assert_eq!(reports[0].processed(), 0);
        assert_eq!(reports[1].similarity_calls, 0);
        assert_eq!(reports[1].computed.values().sum::<usize>(), 0);
    }

    #[tokio::test]
    async fn test_restart_after_failed_commit_matches_clean_run() {
        let clean = Arc::new(MemoryStore::with_patents(population()));
        orchestrator(clean.clone(), Arc::new(CountingScorer::default()), config())
            .run(&all_indices())
            .await
            .unwrap();

        let store = Arc::new(MemoryStore::with_patents(population()));
        let orchestrator = orchestrator(store.clone(), Arc::new(CountingScorer::default()), config());

        store.fail_next_commits(1);
        let err = orchestrator.run(&all_indices()).await.unwrap_err();
        assert!(matches!(err, BatchError::Storage { .. }));
        assert_eq!(store.partition_count().await, 0);

        // Partitions commit, then the first index page fails
        orchestrator.run_partitions(3).await.unwrap();
        store.fail_next_commits(1);
        assert!(orchestrator.run_indices(&all_indices()).await.is_err());
        assert_eq!(store.pair_count().await, 0);

        orchestrator.run(&all_indices()).await.unwrap();
        assert_eq!(snapshot(&store).await, snapshot(&clean).await);
        assert_eq!(store.pair_count().await, clean.pair_count().await);
    }

    #[tokio::test]
    async fn test_restart_after_mid_phase_failure_matches_clean_run() {
        let clean = Arc::new(MemoryStore::with_patents(population()));
        orchestrator(clean.clone(), Arc::new(CountingScorer::default()), config())
            .run(&all_indices())
            .await
            .unwrap();

        let store = Arc::new(MemoryStore::with_patents(population()));
        let orchestrator = orchestrator(store.clone(), Arc::new(CountingScorer::default()), config());

        // Page 1 (A, B, F) commits, page 2 (ORPHAN, V, W) fails
        store.fail_commits_after(1, 1);
        let err = orchestrator.run(&all_indices()).await.unwrap_err();
        assert!(matches!(err, BatchError::Storage { .. }));
        assert_eq!(store.partition_count().await, 3);
        assert!(store.partition("F").await.is_some());
        assert!(store.partition("V").await.is_none());

        // Same for the index phase once every partition is stored
        orchestrator.run_partitions(3).await.unwrap();
        assert_eq!(store.partition_count().await, IDS.len());
        store.fail_commits_after(1, 1);
        assert!(orchestrator.run_indices(&all_indices()).await.is_err());
        assert!(store.index_values("F").await.is_some());
        assert!(store.index_values("V").await.is_none());

        orchestrator.run(&all_indices()).await.unwrap();
        assert_eq!(snapshot(&store).await, snapshot(&clean).await);
        assert_eq!(store.pair_count().await, clean.pair_count().await);
    }

    #[tokio::test]
    async fn test_transient_commit_failures_are_retried() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let config = BatchConfig {
            commit_max_elapsed_secs: 30,
            ..config()
        };
        store.fail_next_commits(2);

        let reports = orchestrator(store.clone(), Arc::new(CountingScorer::default()), config)
            .run(&all_indices())
            .await
            .unwrap();

        assert_eq!(reports[0].resolved, IDS.len());
        assert_eq!(store.partition_count().await, IDS.len());
    }

    #[tokio::test]
    async fn test_failed_similarity_leaves_cd_f3_for_next_run() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let scorer = Arc::new(CountingScorer::default());
        scorer.failing.store(true, Ordering::SeqCst);
        let orchestrator = orchestrator(store.clone(), scorer.clone(), config());

        let reports = orchestrator.run(&all_indices()).await.unwrap();
        let values = store.index_values("F").await.unwrap();
        close(values.cd_f2_t, 0.75);
        assert!(values.cd_f3_t.is_none());
        assert_eq!(reports[1].index_failures.get(&IndexName::CdF3T), Some(&1));
        assert_eq!(reports[1].failed, 1);
        assert_eq!(store.pair_count().await, 0);

        scorer.failing.store(false, Ordering::SeqCst);
        let reports = orchestrator.run(&all_indices()).await.unwrap();
        close(store.index_values("F").await.unwrap().cd_f3_t, 0.375);
        assert_eq!(reports[1].similarity_calls, 3);
    }

    #[tokio::test]
    async fn test_empty_abstracts_leave_cd_f3_undefined() {
        let patents = population()
            .into_iter()
            .map(|p| PatentRecord {
                abstract_text: String::new(),
                ..p
            });
        let store = Arc::new(MemoryStore::with_patents(patents));
        let scorer = Arc::new(CountingScorer::default());

        orchestrator(store.clone(), scorer.clone(), config())
            .run(&all_indices())
            .await
            .unwrap();

        let values = store.index_values("F").await.unwrap();
        close(values.cd_t, 0.25);
        assert!(values.cd_f3_t.is_none());
        assert_eq!(scorer.calls(), 0);
    }

    #[tokio::test]
    async fn test_requested_subset_only() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let scorer = Arc::new(CountingScorer::default());
        let orchestrator = orchestrator(store.clone(), scorer.clone(), config());

        orchestrator
            .run(&BatchParams::new(3, [IndexName::CdT]))
            .await
            .unwrap();

        let values = store.index_values("F").await.unwrap();
        close(values.cd_t, 0.25);
        assert!(values.cd_f_t.is_none());
        assert_eq!(scorer.calls(), 0);

        // Adding a new variant later fills only that field
        orchestrator
            .run_indices(&BatchParams::new(3, [IndexName::CdFT]))
            .await
            .unwrap();
        let values = store.index_values("F").await.unwrap();
        close(values.cd_t, 0.25);
        close(values.cd_f_t, 0.25);
    }

    #[tokio::test]
    async fn test_listed_only_population() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let config = BatchConfig {
            listed_only: true,
            ..config()
        };
        let report = orchestrator(store.clone(), Arc::new(CountingScorer::default()), config)
            .run_partitions(3)
            .await
            .unwrap();

        assert_eq!(report.resolved, 1);
        assert!(store.partition("F").await.is_some());
        assert!(store.partition("X").await.is_none());
    }

    #[test]
    fn test_unsupported_index_is_a_configuration_error() {
        let err = BatchParams::parse(10, "cd_t,cd_x").unwrap_err();
        assert!(matches!(err, BatchError::ConfigError(msg) if msg.contains("cd_x")));
        assert!(BatchParams::parse(0, "cd_t").is_err());
        assert!(BatchParams::parse(10, "").is_err());

        let params = BatchParams::parse(10, "cd_f3_t, cd_t").unwrap();
        assert_eq!(params.indices.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_any_read() {
        let store = Arc::new(MemoryStore::with_patents(population()));
        let orchestrator = orchestrator(store.clone(), Arc::new(CountingScorer::default()), config());

        let err = orchestrator
            .run(&BatchParams::new(10, Vec::<IndexName>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::ConfigError(_)));
        assert!(orchestrator.run_partitions(0).await.is_err());
        assert_eq!(store.citation_reads(), 0);
        assert_eq!(store.partition_count().await, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let config = BatchConfig {
            worker_concurrency: 0,
            ..config()
        };
        let result = BatchOrchestrator::new(store, Arc::new(CountingScorer::default()), config, 4);
        assert!(matches!(result, Err(BatchError::ConfigError(_))));
    }

    /// Lists ids the underlying store knows nothing about
    struct GhostStore {
        inner: MemoryStore,
        ghosts: BTreeSet<String>,
    }

    #[async_trait]
    impl CitationLookup for GhostStore {
        async fn citations(
            &self,
            id: &str,
            direction: Direction,
        ) -> citeindex_common::Result<Option<CitationSet>> {
            self.inner.citations(id, direction).await
        }
    }

    #[async_trait]
    impl DateLookup for GhostStore {
        async fn publication_date(&self, id: &str) -> citeindex_common::Result<Option<NaiveDate>> {
            self.inner.publication_date(id).await
        }
    }

    #[async_trait]
    impl EntityStore for GhostStore {
        async fn unresolved_partitions(
            &self,
            cursor: Option<&str>,
            limit: u64,
            listed_only: bool,
        ) -> citeindex_common::Result<Vec<String>> {
            let mut ids = self
                .inner
                .unresolved_partitions(cursor, limit, listed_only)
                .await?;
            ids.extend(
                self.ghosts
                    .iter()
                    .filter(|id| cursor.map_or(true, |c| id.as_str() > c))
                    .cloned(),
            );
            ids.sort();
            ids.truncate(limit as usize);
            Ok(ids)
        }

        async fn unresolved_indices(
            &self,
            cursor: Option<&str>,
            limit: u64,
            fields: &BTreeSet<IndexName>,
        ) -> citeindex_common::Result<Vec<IndexCandidate>> {
            self.inner.unresolved_indices(cursor, limit, fields).await
        }

        async fn abstracts(
            &self,
            ids: &[String],
        ) -> citeindex_common::Result<HashMap<String, String>> {
            self.inner.abstracts(ids).await
        }

        async fn pair_scores(
            &self,
            pairs: &[PairKey],
        ) -> citeindex_common::Result<HashMap<PairKey, f64>> {
            self.inner.pair_scores(pairs).await
        }

        async fn commit_partition_page(
            &self,
            rows: Vec<PartitionRecord>,
        ) -> citeindex_common::Result<()> {
            self.inner.commit_partition_page(rows).await
        }

        async fn commit_index_page(
            &self,
            pairs: Vec<PairSimilarity>,
            rows: Vec<IndexRecord>,
        ) -> citeindex_common::Result<()> {
            self.inner.commit_index_page(pairs, rows).await
        }

        async fn missing_citations(
            &self,
            cursor: Option<&str>,
            limit: u64,
        ) -> citeindex_common::Result<Vec<String>> {
            self.inner.missing_citations(cursor, limit).await
        }
    }

    #[tokio::test]
    async fn test_unknown_focal_entities_are_skipped_once() {
        let store = Arc::new(GhostStore {
            inner: MemoryStore::with_patents(population()),
            ghosts: ["C-GHOST".to_string(), "ZZ-GHOST".to_string()].into(),
        });
        let orchestrator = orchestrator(store.clone(), Arc::new(CountingScorer::default()), config());

        let report = orchestrator.run_partitions(3).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.resolved, IDS.len());
        assert_eq!(report.pages, 4);

        // Ghosts stay unresolved and are skipped again on the next run
        let report = orchestrator.run_partitions(3).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.resolved, 0);
    }
}
