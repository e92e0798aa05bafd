//! Configuration management for CiteIndex
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::AppError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Similarity service configuration
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Batch orchestration configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables on startup
    #[serde(default = "default_enabled")]
    pub ensure_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimilarityConfig {
    /// Similarity provider: http, lexical
    #[serde(default = "default_similarity_provider")]
    pub provider: String,

    /// Base URL of the similarity service
    #[serde(default = "default_similarity_url")]
    pub url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_similarity_timeout")]
    pub timeout_secs: u64,

    /// Attempts per pair before giving up for this run
    #[serde(default = "default_similarity_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds (doubled per attempt)
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,

    /// Maximum in-flight similarity calls
    #[serde(default = "default_similarity_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Focal entities per page
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Maximum entities computed concurrently within a page
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Maximum memoized graph lookups per run (0 = unbounded)
    #[serde(default)]
    pub cache_capacity: usize,

    /// Restrict the partition phase to listed-company patents
    #[serde(default)]
    pub listed_only: bool,

    /// Give up committing a page after this many seconds of retries
    #[serde(default = "default_commit_timeout")]
    pub commit_max_elapsed_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or an EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

// Default value functions
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_similarity_provider() -> String { "http".to_string() }
fn default_similarity_url() -> String { "http://localhost:8000".to_string() }
fn default_similarity_timeout() -> u64 { 5 }
fn default_similarity_attempts() -> u32 { 3 }
fn default_retry_delay() -> u64 { 200 }
fn default_similarity_concurrency() -> usize { 8 }
fn default_batch_size() -> u64 { 10_000 }
fn default_worker_concurrency() -> usize { 16 }
fn default_commit_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_enabled() -> bool { true }

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            provider: default_similarity_provider(),
            url: default_similarity_url(),
            timeout_secs: default_similarity_timeout(),
            max_attempts: default_similarity_attempts(),
            retry_base_delay_ms: default_retry_delay(),
            concurrency: default_similarity_concurrency(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            worker_concurrency: default_worker_concurrency(),
            cache_capacity: 0,
            listed_only: false,
            commit_max_elapsed_secs: default_commit_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
        }
    }
}

impl SimilarityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=10).contains(&self.max_attempts) {
            return Err(AppError::Configuration {
                message: format!(
                    "similarity.max_attempts must be between 1 and 10, got {}",
                    self.max_attempts
                ),
            });
        }
        if self.concurrency == 0 {
            return Err(AppError::Configuration {
                message: "similarity.concurrency must be positive".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(AppError::Configuration {
                message: "similarity.timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl BatchConfig {
    pub fn commit_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.commit_max_elapsed_secs)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::Configuration {
                message: "batch.batch_size must be positive".to_string(),
            });
        }
        if self.worker_concurrency == 0 {
            return Err(AppError::Configuration {
                message: "batch.worker_concurrency must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, AppError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__BATCH__BATCH_SIZE=5000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate every section; called once at startup
    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::Configuration {
                message: "database.url is required".to_string(),
            });
        }
        self.similarity.validate()?;
        self.batch.validate()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/citeindex".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                ensure_schema: default_enabled(),
            },
            similarity: SimilarityConfig::default(),
            batch: BatchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
