//! Error types for CiteIndex
//!
//! Provides a single error enum shared by the engine and worker with:
//! - Distinct variants for each failure mode of a run
//! - Classification into transient (retryable) and fatal failures

use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Entity not found: {id}")]
    EntityNotFound { id: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Transaction failed: {message}")]
    Transaction { message: String },

    // External service errors
    #[error("Similarity service error: {message}")]
    SimilarityError { message: String },

    #[error("Similarity request timed out after {timeout_ms}ms")]
    SimilarityTimeout { timeout_ms: u64 },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unsupported index name: {name}")]
    UnsupportedIndex { name: String },
}

impl AppError {
    /// Check if retrying the failed operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::SimilarityError { .. }
                | AppError::SimilarityTimeout { .. }
                | AppError::DatabaseConnection { .. }
                | AppError::Transaction { .. }
                | AppError::Database(_)
        )
    }

    /// Check if this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Configuration { .. } | AppError::UnsupportedIndex { .. }
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entity_is_neither_transient_nor_fatal() {
        let err = AppError::EntityNotFound { id: "US123".into() };
        assert!(!err.is_transient());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Entity not found: US123");
    }

    #[test]
    fn test_similarity_errors_are_transient() {
        let err = AppError::SimilarityTimeout { timeout_ms: 5000 };
        assert!(err.is_transient());
        assert!(!err.is_fatal());

        let err = AppError::SimilarityError { message: "HTTP 503".into() };
        assert!(err.is_transient());
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        let err = AppError::UnsupportedIndex { name: "cd_x".into() };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Unsupported index name: cd_x");

        let err: AppError = config::ConfigError::Message("missing field `url`".into()).into();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.is_fatal());
    }
}
