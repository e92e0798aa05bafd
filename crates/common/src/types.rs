//! Domain types shared by the engine, the store and the worker

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Direction of a citation lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Entities that cite the given entity
    Forward,
    /// Entities the given entity cites (prior art)
    Backward,
}

/// Three-way partition of second-order citers around a focal entity.
///
/// - `b1f0`: cites one of the focal entity's backward citations but not the
///   focal entity itself
/// - `b1f1`: cites both the focal entity and one of its backward citations
/// - `b0f1`: cites the focal entity only
///
/// Fields are always addressed by name; the sets are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub b1f0: BTreeSet<String>,
    pub b1f1: BTreeSet<String>,
    pub b0f1: BTreeSet<String>,
}

impl Partition {
    /// Cardinalities as `(n_b1f0, n_b1f1, n_b0f1)`
    pub fn counts(&self) -> PartitionCounts {
        PartitionCounts {
            b1f0: self.b1f0.len(),
            b1f1: self.b1f1.len(),
            b0f1: self.b0f1.len(),
        }
    }

    /// Direct citers of the focal entity (`b1f1 ∪ b0f1`)
    pub fn direct_citers(&self) -> impl Iterator<Item = &String> {
        self.b1f1.iter().chain(self.b0f1.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.b1f0.is_empty() && self.b1f1.is_empty() && self.b0f1.is_empty()
    }
}

/// Partition cardinalities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionCounts {
    pub b1f0: usize,
    pub b1f1: usize,
    pub b0f1: usize,
}

impl PartitionCounts {
    pub fn total(&self) -> usize {
        self.b1f0 + self.b1f1 + self.b0f1
    }
}

/// Persisted partition for one focal entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub focal: String,
    pub partition: Partition,
}

/// Supported index variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexName {
    CdT,
    CdFT,
    CdF2T,
    CdF3T,
}

impl IndexName {
    pub const ALL: [IndexName; 4] = [
        IndexName::CdT,
        IndexName::CdFT,
        IndexName::CdF2T,
        IndexName::CdF3T,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::CdT => "cd_t",
            IndexName::CdFT => "cd_f_t",
            IndexName::CdF2T => "cd_f2_t",
            IndexName::CdF3T => "cd_f3_t",
        }
    }

    /// Whether computing this index needs remote similarity scores
    pub fn needs_similarity(&self) -> bool {
        matches!(self, IndexName::CdF3T)
    }

    /// Parse a comma separated list such as `cd_t,cd_f3_t`
    pub fn parse_list(raw: &str) -> Result<BTreeSet<IndexName>, AppError> {
        let names = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(IndexName::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;

        if names.is_empty() {
            return Err(AppError::Configuration {
                message: "at least one index name is required".to_string(),
            });
        }
        Ok(names)
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| AppError::UnsupportedIndex { name: s.to_string() })
    }
}

/// Index values for one focal entity; `None` means undefined or not yet computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexValues {
    pub cd_t: Option<f64>,
    pub cd_f_t: Option<f64>,
    pub cd_f2_t: Option<f64>,
    pub cd_f3_t: Option<f64>,
}

impl IndexValues {
    pub fn get(&self, name: IndexName) -> Option<f64> {
        match name {
            IndexName::CdT => self.cd_t,
            IndexName::CdFT => self.cd_f_t,
            IndexName::CdF2T => self.cd_f2_t,
            IndexName::CdF3T => self.cd_f3_t,
        }
    }

    pub fn set(&mut self, name: IndexName, value: Option<f64>) {
        let slot = match name {
            IndexName::CdT => &mut self.cd_t,
            IndexName::CdFT => &mut self.cd_f_t,
            IndexName::CdF2T => &mut self.cd_f2_t,
            IndexName::CdF3T => &mut self.cd_f3_t,
        };
        *slot = value;
    }

    /// Requested indices that are still null
    pub fn missing<'a>(
        &'a self,
        requested: &'a BTreeSet<IndexName>,
    ) -> impl Iterator<Item = IndexName> + 'a {
        requested.iter().copied().filter(|name| self.get(*name).is_none())
    }

    /// Copy only fields that are null here and non-null in `other`
    pub fn fill_from(&mut self, other: &IndexValues) {
        for name in IndexName::ALL {
            if self.get(name).is_none() {
                if let Some(value) = other.get(name) {
                    self.set(name, Some(value));
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        IndexName::ALL.iter().all(|name| self.get(*name).is_none())
    }
}

/// Partial index update for one focal entity (only non-null fields are written)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub focal: String,
    pub values: IndexValues,
}

/// Focal entity awaiting index computation
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCandidate {
    pub partition: PartitionRecord,
    pub existing: IndexValues,
}

/// Unordered entity pair in canonical order (smaller id first)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    small: String,
    big: String,
}

impl PairKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { small: a, big: b }
        } else {
            Self { small: b, big: a }
        }
    }

    pub fn small(&self) -> &str {
        &self.small
    }

    pub fn big(&self) -> &str {
        &self.big
    }
}

/// Scored pair ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSimilarity {
    pub key: PairKey,
    pub score: f64,
}

/// Orchestrator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Partition,
    Index,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Partition => "partition",
            Phase::Index => "index",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_canonical() {
        let ab = PairKey::new("US200", "US100");
        let ba = PairKey::new("US100", "US200");
        assert_eq!(ab, ba);
        assert_eq!(ab.small(), "US100");
        assert_eq!(ab.big(), "US200");
    }

    #[test]
    fn test_index_name_parsing() {
        let names = IndexName::parse_list("cd_t, cd_f3_t").unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&IndexName::CdF3T));

        let err = IndexName::parse_list("cd_t,cd_x").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedIndex { name } if name == "cd_x"));

        assert!(IndexName::parse_list(" , ").is_err());
    }

    #[test]
    fn test_missing_and_fill() {
        let requested: BTreeSet<_> = IndexName::ALL.into_iter().collect();
        let mut values = IndexValues {
            cd_t: Some(0.5),
            ..Default::default()
        };
        let missing: Vec<_> = values.missing(&requested).collect();
        assert_eq!(missing, vec![IndexName::CdFT, IndexName::CdF2T, IndexName::CdF3T]);

        values.fill_from(&IndexValues {
            cd_t: Some(-1.0),
            cd_f_t: Some(0.25),
            ..Default::default()
        });
        assert_eq!(values.cd_t, Some(0.5));
        assert_eq!(values.cd_f_t, Some(0.25));
    }

    #[test]
    fn test_partition_counts() {
        let partition = Partition {
            b1f0: ["Z".to_string()].into(),
            b1f1: ["X".to_string()].into(),
            b0f1: ["Y".to_string(), "V".to_string()].into(),
        };
        let counts = partition.counts();
        assert_eq!(counts.total(), 4);
        assert_eq!(partition.direct_citers().count(), 3);
    }
}
