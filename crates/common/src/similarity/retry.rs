//! Retry decorator for similarity scorers

use super::SimilarityScorer;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Wraps a scorer with an attempt budget, per-call timeout and exponential
/// delay between attempts. Nothing is remembered between calls; a pair that
/// exhausts its budget simply fails for this run.
pub struct RetryingScorer<S> {
    inner: S,
    max_attempts: u32,
    timeout: Duration,
    base_delay: Duration,
}

impl<S: SimilarityScorer> RetryingScorer<S> {
    pub fn new(inner: S, max_attempts: u32, timeout: Duration, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            timeout,
            base_delay,
        }
    }

    async fn attempt(&self, text1: &str, text2: &str) -> Result<f64> {
        match tokio::time::timeout(self.timeout, self.inner.score(text1, text2)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::SimilarityTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl<S: SimilarityScorer> SimilarityScorer for RetryingScorer<S> {
    async fn score(&self, text1: &str, text2: &str) -> Result<f64> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // Exponential backoff
                let delay = self.base_delay * 2_u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(text1, text2).await {
                Ok(score) => return Ok(score),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Similarity request failed, retrying"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::SimilarityError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}
