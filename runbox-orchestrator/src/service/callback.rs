//! Callback Service
//!
//! Status Callback Receiver: applies worker reports to execution records.
//!
//! Terminal records are never overwritten. A report for a record that is
//! already SUCCESS or FAILED is accepted and ignored, which makes duplicate
//! deliveries harmless and keeps a stale FAILED from replacing a SUCCESS.

use runbox_core::dto::execution::ExecutionUpdate;
use std::sync::Arc;

use crate::repository::{ExecutionRepository, UpdateOutcome};

/// Service error type
#[derive(Debug)]
pub enum CallbackError {
    Unauthorized,
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for CallbackError {
    fn from(err: sqlx::Error) -> Self {
        CallbackError::DatabaseError(err)
    }
}

pub struct CallbackReceiver {
    repo: Arc<dyn ExecutionRepository>,
    token: Option<String>,
}

impl CallbackReceiver {
    /// `token` is the shared secret workers must present; with none
    /// configured every report is rejected
    pub fn new(repo: Arc<dyn ExecutionRepository>, token: Option<String>) -> Self {
        Self { repo, token }
    }

    /// Checks the token presented with a report
    pub fn authorize(&self, presented: Option<&str>) -> Result<(), CallbackError> {
        match (self.token.as_deref(), presented) {
            (Some(expected), Some(presented)) if tokens_match(expected, presented) => Ok(()),
            _ => Err(CallbackError::Unauthorized),
        }
    }

    /// Applies a report; unknown ids and terminal records are no-ops
    pub async fn receive(&self, update: ExecutionUpdate) -> Result<UpdateOutcome, CallbackError> {
        let outcome = self.repo.apply_update(&update).await?;

        match &outcome {
            UpdateOutcome::Applied(execution) => {
                tracing::info!(
                    execution_id = %execution.id,
                    "Execution status set to {}",
                    execution.status
                );
            }
            UpdateOutcome::AlreadyTerminal(execution) => {
                tracing::info!(
                    execution_id = %execution.id,
                    "Ignoring {} report, execution already {}",
                    update.status,
                    execution.status
                );
            }
            UpdateOutcome::NotFound => {
                tracing::warn!(
                    execution_id = %update.id,
                    "Status report for unknown execution ignored"
                );
            }
        }

        Ok(outcome)
    }
}

/// Compares two tokens in time independent of where they differ
fn tokens_match(expected: &str, presented: &str) -> bool {
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
