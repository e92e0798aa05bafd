//! Offline token-overlap scorer

use super::SimilarityScorer;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Jaccard similarity over lowercase alphanumeric tokens.
///
/// Deterministic and local; meant for dry runs and tests where the remote
/// service is unavailable.
pub struct LexicalScorer;

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SimilarityScorer for LexicalScorer {
    async fn score(&self, text1: &str, text2: &str) -> Result<f64> {
        let (a, b) = (tokens(text1), tokens(text2));
        let union = a.union(&b).count();
        if union == 0 {
            return Ok(0.0);
        }
        Ok(a.intersection(&b).count() as f64 / union as f64)
    }

    fn provider_name(&self) -> &str {
        "lexical"
    }
}
