//! Execution API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use runbox_core::domain::execution::{Execution, ExecutionStatus};
use runbox_core::dto::execution::{
    CreateExecution, ExecutionListResponse, ExecutionResponse, ExecutionUpdate,
};
use runbox_core::job_env::EXECUTION_TOKEN_HEADER;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
struct UpdateAck {
    applied: bool,
}

impl OrchestratorClient {
    // =============================================================================
    // Execution Lifecycle
    // =============================================================================

    /// Submit code for execution
    ///
    /// # Returns
    /// The created record, status RUNNING
    ///
    /// # Errors
    /// `ClientError::SchedulingFailed` when the record was created but
    /// staging or scheduling failed; the record is already FAILED.
    pub async fn submit_execution(&self, req: &CreateExecution) -> Result<Execution> {
        let url = format!("{}/api/executions", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        let body: ExecutionResponse = self.handle_response(response).await?;
        Ok(body.execution)
    }

    /// List a user's executions, newest first
    ///
    /// # Arguments
    /// * `user_id` - Owner of the executions
    /// * `status` - Only return executions in this status
    pub async fn list_executions(
        &self,
        user_id: &str,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<Execution>> {
        let url = format!("{}/api/executions", self.base_url);
        let mut query = vec![("userId", user_id.to_string())];
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }

        let response = self.client.get(&url).query(&query).send().await?;

        let body: ExecutionListResponse = self.handle_response(response).await?;
        Ok(body.executions)
    }

    /// Get an execution by ID
    pub async fn get_execution(&self, id: Uuid) -> Result<Execution> {
        let url = format!("{}/api/executions/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        let body: ExecutionResponse = self.handle_response(response).await?;
        Ok(body.execution)
    }

    /// Delete an execution record
    pub async fn delete_execution(&self, id: Uuid) -> Result<()> {
        let url = format!("{}/api/executions/{}", self.base_url, id);
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Status Callback
    // =============================================================================

    /// Send a status update, as the worker does at the end of a run
    ///
    /// Used by operators to resend a report that never arrived. Requires a
    /// token set with `with_token`; without one the orchestrator answers 401.
    ///
    /// # Returns
    /// Whether the update changed the record. Updates against a record that
    /// already finished are accepted and ignored.
    pub async fn update_execution(&self, update: &ExecutionUpdate) -> Result<bool> {
        let url = format!("{}/api/executions", self.base_url);
        let mut request = self.client.put(&url).json(update);
        if let Some(token) = &self.token {
            request = request.header(EXECUTION_TOKEN_HEADER, token);
        }

        let response = request.send().await?;

        let ack: UpdateAck = self.handle_response(response).await?;
        Ok(ack.applied)
    }
}
