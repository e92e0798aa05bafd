//! CD index family
//!
//! Every index is a weighted sum over the three partition classes divided
//! by the partition size `N`. A class is identified by whether its members
//! cite the focal entity's prior art (`b`) and the focal entity itself (`f`):
//! `b1f0 = (1, 0)`, `b1f1 = (1, 1)`, `b0f1 = (0, 1)`.

use citeindex_common::errors::{AppError, Result};
use citeindex_common::metrics::record_index_value;
use citeindex_common::types::{IndexCandidate, IndexName, IndexValues, PartitionCounts};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::pairs::PairScores;

/// Per-member weight as a function of `(b, f)`
type Weight = fn(f64, f64) -> f64;

/// `-2fb + f`: `b1f0 -> 0`, `b1f1 -> -1`, `b0f1 -> 1`
fn disruption_weight(b: f64, f: f64) -> f64 {
    -2.0 * f * b + f
}

/// `f(-fb + 2f) - 1`: `b1f0 -> -1`, `b1f1 -> 0`, `b0f1 -> 1`
fn focus_weight(b: f64, f: f64) -> f64 {
    f * (-f * b + 2.0 * f) - 1.0
}

fn weighted_mean(counts: PartitionCounts, weight: Weight) -> Option<f64> {
    let n = counts.total();
    if n == 0 {
        return None;
    }

    let sum = counts.b1f0 as f64 * weight(1.0, 0.0)
        + counts.b1f1 as f64 * weight(1.0, 1.0)
        + counts.b0f1 as f64 * weight(0.0, 1.0);
    Some(sum / n as f64)
}

/// Classic CD index: `(n_b0f1 - n_b1f1) / N`
pub fn cd_t(counts: PartitionCounts) -> Option<f64> {
    weighted_mean(counts, disruption_weight)
}

/// Forward-focused variant: `(n_b0f1 - n_b1f0) / N`
pub fn cd_f_t(counts: PartitionCounts) -> Option<f64> {
    weighted_mean(counts, focus_weight)
}

/// `cd_f_t` scaled by the number of direct citers
pub fn cd_f2_t(counts: PartitionCounts) -> Option<f64> {
    cd_f_t(counts).map(|value| value * (counts.b1f1 + counts.b0f1) as f64)
}

/// `cd_f2_t` scaled by the mean focal/citer similarity
pub fn cd_f3_t(counts: PartitionCounts, mean_similarity: Option<f64>) -> Option<f64> {
    Some(mean_similarity? * cd_f2_t(counts)?)
}

/// Arithmetic mean; `None` for an empty sample
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Result of evaluating the missing indices of one focal entity
#[derive(Debug, Default)]
pub struct IndexOutcome {
    /// Newly computed values; untouched fields stay `None`
    pub values: IndexValues,
    pub computed: Vec<IndexName>,
    pub undefined: Vec<IndexName>,
    pub failed: Vec<(IndexName, AppError)>,
}

impl IndexOutcome {
    pub fn is_failed(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Evaluates requested indices that are still null for a focal entity.
///
/// Failures are per index: an index that cannot be evaluated is logged and
/// left null while the others are still computed.
#[derive(Debug, Clone, Default)]
pub struct IndexEngine;

impl IndexEngine {
    pub fn new() -> Self {
        Self
    }

    /// `similarity` holds the page's resolved pair scores, or `None` when
    /// they could not be loaded at all.
    pub fn evaluate(
        &self,
        candidate: &IndexCandidate,
        requested: &BTreeSet<IndexName>,
        similarity: Option<&PairScores>,
    ) -> IndexOutcome {
        let focal = candidate.partition.focal.as_str();
        let counts = candidate.partition.partition.counts();
        let mut outcome = IndexOutcome::default();

        for name in candidate.existing.missing(requested) {
            match self.evaluate_one(name, candidate, counts, similarity) {
                Ok(Some(value)) => {
                    outcome.values.set(name, Some(value));
                    outcome.computed.push(name);
                    record_index_value(name.as_str(), "computed");
                }
                Ok(None) => {
                    outcome.undefined.push(name);
                    record_index_value(name.as_str(), "undefined");
                }
                Err(e) => {
                    warn!(focal = %focal, index = %name, error = %e, "Index left null");
                    record_index_value(name.as_str(), "failed");
                    outcome.failed.push((name, e));
                }
            }
        }

        debug!(
            focal = %focal,
            computed = outcome.computed.len(),
            undefined = outcome.undefined.len(),
            failed = outcome.failed.len(),
            "Indices evaluated"
        );
        outcome
    }

    fn evaluate_one(
        &self,
        name: IndexName,
        candidate: &IndexCandidate,
        counts: PartitionCounts,
        similarity: Option<&PairScores>,
    ) -> Result<Option<f64>> {
        match name {
            IndexName::CdT => Ok(cd_t(counts)),
            IndexName::CdFT => Ok(cd_f_t(counts)),
            IndexName::CdF2T => Ok(cd_f2_t(counts)),
            IndexName::CdF3T => {
                if cd_f2_t(counts).is_none() {
                    return Ok(None);
                }
                let scores = similarity.ok_or_else(|| AppError::SimilarityError {
                    message: "pair scores unavailable for this page".to_string(),
                })?;
                let mean_similarity = scores.mean_for(&candidate.partition)?;
                Ok(cd_f3_t(counts, mean_similarity))
            }
        }
    }
}
