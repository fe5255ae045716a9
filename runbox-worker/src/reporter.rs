//! Status reporter
//!
//! Delivers the worker's final status report to the orchestrator callback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use runbox_core::dto::execution::ExecutionUpdate;
use runbox_core::job_env::EXECUTION_TOKEN_HEADER;
use std::time::Duration;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Sends status reports to the orchestrator
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Delivers one report
    ///
    /// Implementations may retry; an error means the report was not
    /// delivered.
    async fn report(&self, update: &ExecutionUpdate) -> Result<()>;
}

/// HTTP implementation of StatusReporter
pub struct HttpStatusReporter {
    client: Client,
    callback_url: String,
    token: String,
    max_attempts: u32,
    initial_delay: Duration,
}

impl HttpStatusReporter {
    /// Creates a reporter for a callback URL
    ///
    /// # Arguments
    /// * `callback_url` - Full URL of the status callback endpoint
    /// * `token` - Shared secret sent in the `x-execution-token` header
    pub fn new(callback_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            callback_url: callback_url.into(),
            token: token.into(),
            max_attempts: MAX_ATTEMPTS,
            initial_delay: INITIAL_DELAY,
        })
    }

    /// Overrides the retry budget
    pub fn with_retry(mut self, max_attempts: u32, initial_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_delay = initial_delay;
        self
    }

    async fn send_once(&self, update: &ExecutionUpdate) -> Result<()> {
        let response = self
            .client
            .put(&self.callback_url)
            .header(EXECUTION_TOKEN_HEADER, &self.token)
            .json(update)
            .send()
            .await
            .context("Failed to send execution update")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Execution update rejected: {} - {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl StatusReporter for HttpStatusReporter {
    async fn report(&self, update: &ExecutionUpdate) -> Result<()> {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            attempt += 1;

            match self.send_once(update).await {
                Ok(()) => {
                    info!("Reported {} for execution {}", update.status, update.id);
                    return Ok(());
                }
                Err(e) if attempt >= self.max_attempts => {
                    return Err(e.context(format!(
                        "Giving up after {} attempt(s)",
                        self.max_attempts
                    )));
                }
                Err(e) => {
                    warn!(
                        "Failed to report status (attempt {}/{}): {:#}",
                        attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}
