//! Similarity scoring abstraction
//!
//! Provides a unified interface for pairwise abstract similarity:
//! - HTTP client for a remote sentence-similarity service
//! - Retry decorator with a fixed attempt budget and per-call timeout
//! - Offline lexical (token overlap) scorer

mod lexical;
mod retry;

pub use lexical::LexicalScorer;
pub use retry::RetryingScorer;

use crate::config::SimilarityConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Trait for pairwise similarity scoring
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Score two texts; the result lies in `[0, 1]`
    async fn score(&self, text1: &str, text2: &str) -> Result<f64>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

#[derive(Serialize)]
struct SimilarityRequest<'a> {
    sentence1: &'a str,
    sentence2: &'a str,
}

#[derive(Deserialize)]
struct SimilarityResponse {
    similarity: f64,
}

/// Clamp a raw score into `[0, 1]`, rejecting non-finite values
pub fn normalize_score(raw: f64) -> Result<f64> {
    if !raw.is_finite() {
        return Err(AppError::SimilarityError {
            message: format!("non-finite similarity score: {}", raw),
        });
    }
    Ok(raw.clamp(0.0, 1.0))
}

/// Client for a remote similarity service
///
/// A single call, no retries; wrap it in [`RetryingScorer`] for the
/// attempt budget and timeouts.
pub struct HttpSimilarityClient {
    client: reqwest::Client,
    url: String,
}

impl HttpSimilarityClient {
    /// Create a new client for the service at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: endpoint_url(base_url),
        })
    }

    async fn request(&self, text1: &str, text2: &str) -> Result<f64> {
        let request = SimilarityRequest {
            sentence1: text1,
            sentence2: text2,
        };

        let response = self.client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::SimilarityError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SimilarityError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: SimilarityResponse = response.json().await.map_err(|e| {
            AppError::SimilarityError {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        normalize_score(result.similarity)
    }
}

fn endpoint_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(crate::DEFAULT_SIMILARITY_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, crate::DEFAULT_SIMILARITY_PATH)
    }
}

#[async_trait]
impl SimilarityScorer for HttpSimilarityClient {
    async fn score(&self, text1: &str, text2: &str) -> Result<f64> {
        let start = Instant::now();
        let result = self.request(text1, text2).await;
        crate::metrics::record_similarity(start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

/// Create a scorer based on configuration
pub fn create_scorer(config: &SimilarityConfig) -> Result<Arc<dyn SimilarityScorer>> {
    config.validate()?;

    match config.provider.as_str() {
        "http" => {
            let client = HttpSimilarityClient::new(&config.url)?;
            Ok(Arc::new(RetryingScorer::new(
                client,
                config.max_attempts,
                config.timeout(),
                config.retry_base_delay(),
            )))
        }
        "lexical" => Ok(Arc::new(LexicalScorer)),
        other => Err(AppError::Configuration {
            message: format!("Unknown similarity provider: {}", other),
        }),
    }
}
