//! Deduplicated pairwise similarity resolution
//!
//! For a page of focal entities, every `(focal, direct citer)` pair is
//! canonicalized, checked against stored scores, and only the residual is
//! sent to the similarity service. Pairs where either abstract is empty
//! carry no signal and are neither scored nor stored.

use citeindex_common::errors::{AppError, Result};
use citeindex_common::similarity::SimilarityScorer;
use citeindex_common::store::EntityStore;
use citeindex_common::types::{PairKey, PairSimilarity, PartitionRecord};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::index::mean;

/// Similarity state for one page
#[derive(Debug, Default)]
pub struct PairScores {
    scores: HashMap<PairKey, f64>,
    failed: HashSet<PairKey>,
    no_signal: HashSet<PairKey>,
    fresh: Vec<PairSimilarity>,
    calls: usize,
}

impl PairScores {
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        self.scores.get(&PairKey::new(a, b)).copied()
    }

    /// Mean similarity between the focal entity and its direct citers.
    ///
    /// `Ok(None)` when no pair carries a score; an error when any eligible
    /// pair failed this run, so the mean is never taken over a partial sample.
    pub fn mean_for(&self, record: &PartitionRecord) -> Result<Option<f64>> {
        let mut values = Vec::new();
        let mut failed = 0usize;

        for citer in record.partition.direct_citers() {
            let key = PairKey::new(record.focal.as_str(), citer.as_str());
            if let Some(score) = self.scores.get(&key) {
                values.push(*score);
            } else if self.failed.contains(&key) {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(AppError::SimilarityError {
                message: format!("{} similarity pairs failed for {}", failed, record.focal),
            });
        }
        Ok(mean(&values))
    }

    /// Newly scored pairs to persist with the page
    pub fn take_fresh(&mut self) -> Vec<PairSimilarity> {
        std::mem::take(&mut self.fresh)
    }

    /// Remote calls issued while resolving this page
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn no_signal_count(&self) -> usize {
        self.no_signal.len()
    }
}

/// Resolves similarity scores for a page with bounded concurrency
pub struct PairDeduplicator<S: ?Sized> {
    store: Arc<S>,
    scorer: Arc<dyn SimilarityScorer>,
    concurrency: usize,
}

impl<S> PairDeduplicator<S>
where
    S: EntityStore + ?Sized,
{
    pub fn new(store: Arc<S>, scorer: Arc<dyn SimilarityScorer>, concurrency: usize) -> Self {
        Self {
            store,
            scorer,
            concurrency: concurrency.max(1),
        }
    }

    /// Canonical pairs implied by the direct citers of each record
    pub fn collect_pairs<'a>(
        records: impl IntoIterator<Item = &'a PartitionRecord>,
    ) -> BTreeSet<PairKey> {
        records
            .into_iter()
            .flat_map(|record| {
                record
                    .partition
                    .direct_citers()
                    .filter(move |citer| **citer != record.focal)
                    .map(move |citer| PairKey::new(record.focal.as_str(), citer.as_str()))
            })
            .collect()
    }

    /// Load stored scores and score the residual.
    ///
    /// Storage read failures propagate; individual scoring failures are
    /// recorded per pair and never abort the page.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn resolve(&self, records: &[&PartitionRecord]) -> Result<PairScores> {
        let pairs: Vec<PairKey> = Self::collect_pairs(records.iter().copied())
            .into_iter()
            .collect();
        let mut resolved = PairScores::default();
        if pairs.is_empty() {
            return Ok(resolved);
        }

        resolved.scores = self.store.pair_scores(&pairs).await?;
        let residual: Vec<PairKey> = pairs
            .into_iter()
            .filter(|key| !resolved.scores.contains_key(key))
            .collect();

        let ids: Vec<String> = residual
            .iter()
            .flat_map(|key| [key.small().to_string(), key.big().to_string()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let abstracts = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store.abstracts(&ids).await?
        };
        // Blank abstracts carry no signal; the rest are scored verbatim
        let text = |id: &str| {
            abstracts
                .get(id)
                .map(String::as_str)
                .filter(|s| !s.trim().is_empty())
        };

        let mut to_score = Vec::new();
        for key in residual {
            match (text(key.small()), text(key.big())) {
                (Some(a), Some(b)) => to_score.push((key, a, b)),
                _ => {
                    resolved.no_signal.insert(key);
                }
            }
        }

        resolved.calls = to_score.len();
        let results: Vec<(PairKey, Result<f64>)> = stream::iter(to_score)
            .map(|(key, a, b)| {
                let scorer = self.scorer.clone();
                async move {
                    let result = scorer.score(a, b).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (key, result) in results {
            match result {
                Ok(score) => {
                    resolved.scores.insert(key.clone(), score);
                    resolved.fresh.push(PairSimilarity { key, score });
                }
                Err(e) => {
                    warn!(
                        small = %key.small(),
                        big = %key.big(),
                        error = %e,
                        "Similarity scoring failed, pair left unset"
                    );
                    resolved.failed.insert(key);
                }
            }
        }

        if resolved.calls > 0 {
            info!(
                calls = resolved.calls,
                scored = resolved.fresh.len(),
                failed = resolved.failed.len(),
                no_signal = resolved.no_signal.len(),
                "Similarity pairs resolved"
            );
        } else {
            debug!(no_signal = resolved.no_signal.len(), "No similarity calls needed");
        }

        Ok(resolved)
    }
}
