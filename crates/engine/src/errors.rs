//! Batch error types

use citeindex_common::errors::AppError;

/// Errors that abort a batch run.
///
/// Per-entity and per-pair failures never surface here; they are logged,
/// counted in the run report and retried by the next run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error during {operation}: {source}")]
    Storage {
        operation: String,
        #[source]
        source: AppError,
    },
}

impl BatchError {
    pub fn storage(operation: impl Into<String>, source: AppError) -> Self {
        BatchError::Storage {
            operation: operation.into(),
            source,
        }
    }
}

impl From<AppError> for BatchError {
    fn from(e: AppError) -> Self {
        if e.is_fatal() {
            BatchError::ConfigError(e.to_string())
        } else {
            BatchError::storage("unknown", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_stay_config_errors() {
        let err: BatchError = AppError::UnsupportedIndex {
            name: "cd_x".into(),
        }
        .into();
        assert!(matches!(err, BatchError::ConfigError(msg) if msg.contains("cd_x")));

        let err: BatchError = AppError::Transaction {
            message: "deadlock".into(),
        }
        .into();
        assert!(matches!(err, BatchError::Storage { .. }));
    }
}
