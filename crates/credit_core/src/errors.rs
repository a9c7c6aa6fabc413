//! Error types for the scoring core

use thiserror::Error;

use crate::gbdt::ModelError;

/// Errors that can occur anywhere in the scoring core
#[derive(Error, Debug)]
pub enum ScoringError {
    /// Malformed or out-of-range application input (user-correctable)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Preprocessor/model artifact incompatibility (operator-correctable, never coerced)
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Missing or corrupt artifact at startup
    #[error("Failed to load artifact {path}: {reason}")]
    ArtifactLoad { path: String, reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Explanation could not be produced; scoring itself is unaffected
    #[error("Explainability degraded: {0}")]
    ExplainabilityDegraded(String),

    /// Audit record could not be persisted (compliance gap)
    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    /// Audit query asked for more records than allowed
    #[error("Audit query limit {requested} exceeds the maximum of {max}")]
    AuditLimitExceeded { requested: usize, max: usize },

    /// Malformed audit query (empty limit, inverted date range)
    #[error("Invalid audit query: {0}")]
    InvalidAuditQuery(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding/decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScoringError {
    /// Errors that indicate a broken deployment rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScoringError::SchemaMismatch(_)
                | ScoringError::ArtifactLoad { .. }
                | ScoringError::InvalidConfig(_)
        )
    }

    /// Errors the caller can fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ScoringError::Validation(_)
                | ScoringError::AuditLimitExceeded { .. }
                | ScoringError::InvalidAuditQuery(_)
        )
    }

    pub(crate) fn artifact_load(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        ScoringError::ArtifactLoad {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ModelError> for ScoringError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::FeatureCountMismatch { .. } => ScoringError::SchemaMismatch(err.to_string()),
            ModelError::IoError(e) => ScoringError::Io(e),
            other => ScoringError::ArtifactLoad {
                path: "<model>".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for scoring core operations
pub type Result<T> = std::result::Result<T, ScoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ScoringError::SchemaMismatch("x".into()).is_fatal());
        assert!(ScoringError::artifact_load("model.json", "missing").is_fatal());
        assert!(!ScoringError::Validation("age".into()).is_fatal());

        assert!(ScoringError::Validation("age".into()).is_user_error());
        assert!(ScoringError::AuditLimitExceeded { requested: 5000, max: 1000 }.is_user_error());
        assert!(!ScoringError::AuditWrite("disk full".into()).is_user_error());
    }

    #[test]
    fn test_model_feature_mismatch_maps_to_schema_error() {
        let err: ScoringError = ModelError::FeatureCountMismatch { expected: 3, actual: 2 }.into();
        assert!(matches!(err, ScoringError::SchemaMismatch(_)));
    }

    #[test]
    fn test_limit_message() {
        let err = ScoringError::AuditLimitExceeded { requested: 5000, max: 1000 };
        assert_eq!(err.to_string(), "Audit query limit 5000 exceeds the maximum of 1000");
    }
}
