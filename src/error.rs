//! Error types surfaced by the prediction pipeline
//!
//! Normalization and tokenization never fail: malformed input degrades to
//! unknown tokens. Only session-level failures reach the caller.
//!
//! The enum is `Clone` because a failed initialization is handed to every
//! caller that waited on it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or running the model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Failed to load {}: {reason}", .path.display())]
    VocabularyLoad { path: PathBuf, reason: String },

    #[error("Model artifact '{artifact}' unavailable: {reason}")]
    ArtifactUnavailable { artifact: String, reason: String },

    #[error("Inference failed for parameter {parameter}: {reason}")]
    Inference { parameter: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn vocabulary(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::VocabularyLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn artifact(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Error::ArtifactUnavailable {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether `reinitialize` can be expected to clear this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ArtifactUnavailable { .. } | Error::Inference { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
