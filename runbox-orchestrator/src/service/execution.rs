//! Execution Service
//!
//! Execution Request Handler: records a submission, stages its artifacts and
//! schedules its job. Anything that goes wrong before the job exists is
//! written to the record before the caller hears about it.

use bytes::Bytes;
use runbox_artifacts::{ArtifactError, ArtifactStore, CONTENT_TYPE_PYTHON, CONTENT_TYPE_TEXT};
use runbox_core::domain::artifacts::ArtifactKeys;
use runbox_core::domain::execution::Execution;
use runbox_core::dto::execution::{CreateExecution, ExecutionFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::ExecutionRepository;
use crate::scheduler::{JobScheduler, ScheduleRequest, SchedulerError};

/// Prefix of the log written when an execution could not be started
pub const SCHEDULING_FAILED: &str = "Failed to schedule execution job.";

/// Service error type
#[derive(Debug)]
pub enum ExecutionError {
    NotFound(Uuid),
    ValidationError(String),
    /// Staging or scheduling failed; the record is already FAILED
    SchedulingFailed {
        execution: Box<Execution>,
        reason: String,
    },
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        ExecutionError::DatabaseError(err)
    }
}

/// Anything that stops a job from being started
#[derive(Debug, thiserror::Error)]
enum LaunchError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

pub struct ExecutionService {
    repo: Arc<dyn ExecutionRepository>,
    store: Option<Arc<dyn ArtifactStore>>,
    scheduler: JobScheduler,
    callback_url: Option<String>,
}

impl ExecutionService {
    pub fn new(
        repo: Arc<dyn ExecutionRepository>,
        store: Option<Arc<dyn ArtifactStore>>,
        scheduler: JobScheduler,
        callback_url: Option<String>,
    ) -> Self {
        Self {
            repo,
            store,
            scheduler,
            callback_url,
        }
    }

    /// Records a submission and starts its job
    ///
    /// Returns once the job is created; the job itself runs in the background.
    pub async fn submit(&self, req: CreateExecution) -> Result<Execution, ExecutionError> {
        validate_submission(&req)?;

        let execution = self.repo.create(&req).await?;

        tracing::info!(
            execution_id = %execution.id,
            "Execution created for user {}",
            execution.user_id
        );

        match self.launch(&execution).await {
            Ok(job_name) => {
                tracing::info!(
                    execution_id = %execution.id,
                    job = %job_name,
                    "Execution scheduled"
                );
                Ok(execution)
            }
            Err(err) => {
                let logs = format!("{} {}", SCHEDULING_FAILED, err);
                tracing::error!(execution_id = %execution.id, "{}", logs);

                let failed = self
                    .repo
                    .mark_failed(execution.id, &logs)
                    .await?
                    .unwrap_or(execution);

                Err(ExecutionError::SchedulingFailed {
                    execution: Box::new(failed),
                    reason: err.to_string(),
                })
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Execution, ExecutionError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(ExecutionError::NotFound(id))
    }

    /// Lists one user's executions, newest first
    pub async fn list(&self, filter: ExecutionFilter) -> Result<Vec<Execution>, ExecutionError> {
        if filter.user_id.as_deref().is_none_or(|user| user.trim().is_empty()) {
            return Err(ExecutionError::ValidationError(
                "Missing userId parameter".to_string(),
            ));
        }

        Ok(self.repo.list(&filter).await?)
    }

    /// Deletes a record; a job still running for it is left to its watcher
    pub async fn delete(&self, id: Uuid) -> Result<(), ExecutionError> {
        if !self.repo.delete(id).await? {
            return Err(ExecutionError::NotFound(id));
        }

        tracing::info!(execution_id = %id, "Execution deleted");
        Ok(())
    }

    async fn launch(&self, execution: &Execution) -> Result<String, LaunchError> {
        // Fail before uploading anything if the job could never be built
        self.scheduler
            .check_prerequisites(self.callback_url.as_deref())?;

        let store = self.store.as_ref().ok_or_else(|| {
            SchedulerError::Configuration("S3 client not initialized.".to_string())
        })?;

        let keys = ArtifactKeys::for_execution(execution.id);

        store
            .put_object(
                &keys.code,
                Bytes::from(execution.code.clone()),
                CONTENT_TYPE_PYTHON,
            )
            .await?;

        let requirements_key = match &execution.requirements {
            Some(requirements) => {
                store
                    .put_object(
                        &keys.requirements,
                        Bytes::from(requirements.clone()),
                        CONTENT_TYPE_TEXT,
                    )
                    .await?;
                Some(keys.requirements)
            }
            None => None,
        };

        let job_name = self
            .scheduler
            .schedule(ScheduleRequest {
                execution_id: execution.id,
                user_id: execution.user_id.clone(),
                code_key: keys.code,
                requirements_key,
                input_key: execution.input_file.clone(),
                output_key: keys.output,
                callback_url: self.callback_url.clone(),
            })
            .await?;

        Ok(job_name)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_submission(req: &CreateExecution) -> Result<(), ExecutionError> {
    if req.user_id.trim().is_empty() || req.code.trim().is_empty() {
        return Err(ExecutionError::ValidationError(
            "Missing required fields: userId, code".to_string(),
        ));
    }
    Ok(())
}
