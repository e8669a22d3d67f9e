// src/error.rs
//
// Error taxonomy shared by the engine, the stores and the CLI.

use thiserror::Error;

use crate::storage::TrackId;

/// Errors produced by the similarity engine
#[derive(Debug, Error)]
pub enum FindSimilarError {
    /// Decoded audio is empty or shorter than one analysis frame
    #[error("insufficient audio: {samples} samples, at least {required} required")]
    InsufficientAudio { samples: usize, required: usize },

    /// A feature matrix with unusable dimensions or values
    #[error("malformed matrix: {0}")]
    InvalidMatrix(String),

    /// Covariance of a feature matrix could not be inverted
    #[error("singular covariance matrix ({dimension}x{dimension})")]
    SingularCovariance { dimension: usize },

    /// A stored model does not match the configured feature size
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A seed track exists but has no model for the configured analysis method
    #[error("track {0} has no model")]
    MissingModel(TrackId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by a persistence collaborator, passed through unchanged
    #[error("storage error: {0}")]
    Storage(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FindSimilarError {
    /// Per-track failures that a batch scan logs and skips.
    ///
    /// Configuration and storage errors abort the scan.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientAudio { .. }
                | Self::InvalidMatrix(_)
                | Self::SingularCovariance { .. }
                | Self::Decode(_)
                | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FindSimilarError>;
