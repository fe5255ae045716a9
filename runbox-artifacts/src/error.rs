//! Error types for artifact storage

use thiserror::Error;

/// Result type alias for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Errors that can occur when reading or writing artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No object under this key
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Download failed
    #[error("Failed to get artifact {key}: {message}")]
    Get { key: String, message: String },

    /// Upload failed
    #[error("Failed to put artifact {key}: {message}")]
    Put { key: String, message: String },
}

impl ArtifactError {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
