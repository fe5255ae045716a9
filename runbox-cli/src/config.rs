//! Configuration module
//!
//! Handles CLI configuration including orchestrator URL and the callback token.

use runbox_client::OrchestratorClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
    /// Shared secret for resending status updates
    pub execution_token: Option<String>,
}

impl Config {
    pub fn client(&self) -> OrchestratorClient {
        let client = OrchestratorClient::new(&self.orchestrator_url);
        match &self.execution_token {
            Some(token) => client.with_token(token),
            None => client,
        }
    }
}
