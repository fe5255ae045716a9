//! Runbox HTTP Client
//!
//! A typed HTTP client for the Runbox orchestrator API, shared by the CLI
//! and by operator tooling.
//!
//! # Example
//!
//! ```no_run
//! use runbox_client::OrchestratorClient;
//! use runbox_core::dto::execution::CreateExecution;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let execution = client.submit_execution(&CreateExecution {
//!         user_id: "alice".to_string(),
//!         code: "print('hello')".to_string(),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Submitted execution: {}", execution.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod executions;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// HTTP client for the Runbox orchestrator API
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Callback token, needed only to resend status updates
    token: Option<String>,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        }
    }

    /// Set the token sent with status updates
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Error bodies of the form `{"error": "..."}` are unwrapped into the
    /// error message; a body that also names an `executionId` means the
    /// record exists but could not be scheduled.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            return Err(Self::error_from(status.as_u16(), response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            return Err(Self::error_from(status.as_u16(), response).await);
        }

        Ok(())
    }

    async fn error_from(status: u16, response: reqwest::Response) -> ClientError {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let Ok(body) = serde_json::from_str::<Value>(&error_text) else {
            return ClientError::api_error(status, error_text);
        };

        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(error_text);

        match body
            .get("executionId")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
        {
            Some(execution_id) => ClientError::SchedulingFailed {
                execution_id,
                message,
            },
            None => ClientError::api_error(status, message),
        }
    }
}
