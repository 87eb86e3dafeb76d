//! Error taxonomy shared by every detector component

use serde::Serialize;
use thiserror::Error;

/// Result alias for detector operations
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Distinguishable failure kinds reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ArtifactUnavailable,
    TrainingFailure,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ArtifactUnavailable => "artifact_unavailable",
            ErrorKind::TrainingFailure => "training_failure",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

/// Errors raised by the detector core
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Bad or missing input field. Always recoverable.
    #[error("{reason}")]
    Validation { field: String, reason: String },

    /// No trained or loaded artifact is being served
    #[error("Model not loaded. Please train the model first.")]
    ArtifactUnavailable,

    /// Dataset production or model fitting failed
    #[error("Training failed: {0}")]
    Training(String),

    /// Persist/load collaborator failed
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl DetectorError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DetectorError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn training(reason: impl Into<String>) -> Self {
        DetectorError::Training(reason.into())
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        DetectorError::Storage(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectorError::Validation { .. } => ErrorKind::ValidationError,
            DetectorError::ArtifactUnavailable => ErrorKind::ArtifactUnavailable,
            DetectorError::Training(_) => ErrorKind::TrainingFailure,
            DetectorError::Storage(_) => ErrorKind::StorageFailure,
        }
    }
}

impl From<std::io::Error> for DetectorError {
    fn from(err: std::io::Error) -> Self {
        DetectorError::Storage(err.to_string())
    }
}

impl From<csv::Error> for DetectorError {
    fn from(err: csv::Error) -> Self {
        DetectorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DetectorError {
    fn from(err: serde_json::Error) -> Self {
        DetectorError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            DetectorError::validation("num_posts", "bad"),
            DetectorError::ArtifactUnavailable,
            DetectorError::training("single class"),
            DetectorError::storage("disk full"),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), 4);
    }

    #[test]
    fn test_validation_message_is_reason() {
        let err = DetectorError::validation("has_bio", "has_bio must be 0 or 1");
        assert_eq!(err.to_string(), "has_bio must be 0 or 1");
        assert_eq!(err.kind().as_str(), "validation_error");
    }
}
