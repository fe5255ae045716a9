//! Error types for the Runbox client

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Runbox client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The execution was recorded but could not be scheduled
    #[error("Execution {execution_id} failed to schedule: {message}")]
    SchedulingFailed { execution_id: Uuid, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
            || matches!(self, Self::SchedulingFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ClientError::api_error(404, "Execution not found.").is_not_found());
        assert!(ClientError::api_error(401, "Unauthorized").is_client_error());
        assert!(!ClientError::api_error(401, "Unauthorized").is_server_error());
        assert!(ClientError::api_error(500, "boom").is_server_error());
        assert!(
            ClientError::SchedulingFailed {
                execution_id: Uuid::nil(),
                message: "S3 client not initialized.".to_string(),
            }
            .is_server_error()
        );
    }
}
