//! Per-run summary

use crate::index::IndexOutcome;
use citeindex_common::types::{IndexName, Phase};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts accumulated over one phase of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub phase: Phase,
    pub pages: usize,
    /// Entities committed without any failure
    pub resolved: usize,
    /// Entities skipped because they are unknown to the store
    pub skipped: usize,
    /// Entities with at least one local failure, left for the next run
    pub failed: usize,
    pub computed: BTreeMap<IndexName, usize>,
    pub undefined: BTreeMap<IndexName, usize>,
    pub index_failures: BTreeMap<IndexName, usize>,
    pub similarity_calls: usize,
    pub pairs_written: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl RunReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            pages: 0,
            resolved: 0,
            skipped: 0,
            failed: 0,
            computed: BTreeMap::new(),
            undefined: BTreeMap::new(),
            index_failures: BTreeMap::new(),
            similarity_calls: 0,
            pairs_written: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub(crate) fn record_outcome(&mut self, outcome: &IndexOutcome) {
        for name in &outcome.computed {
            *self.computed.entry(*name).or_default() += 1;
        }
        for name in &outcome.undefined {
            *self.undefined.entry(*name).or_default() += 1;
        }
        for (name, _) in &outcome.failed {
            *self.index_failures.entry(*name).or_default() += 1;
        }

        if outcome.is_failed() {
            self.failed += 1;
        } else {
            self.resolved += 1;
        }
    }

    pub fn computed_for(&self, name: IndexName) -> usize {
        self.computed.get(&name).copied().unwrap_or(0)
    }

    pub fn undefined_for(&self, name: IndexName) -> usize {
        self.undefined.get(&name).copied().unwrap_or(0)
    }

    /// Entities looked at, whatever their outcome
    pub fn processed(&self) -> usize {
        self.resolved + self.skipped + self.failed
    }
}
