//! Job Scheduler
//!
//! Turns one execution into one cluster job and hands the job to a watcher.

pub mod watcher;

pub use watcher::{WatchOutcome, WatchPolicy, WatcherSet, watch_job};

use runbox_core::job_env::{JobEnvironment, StoreCredentials};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cluster::{ClusterApi, ClusterError, JobTemplate, build_job, job_name};
use crate::config::StorageConfig;

/// Extra time a job gets beyond the user code limit, for setup and reporting
const DEADLINE_SLACK: Duration = Duration::from_secs(300);

/// Settings every scheduled job shares
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub image: String,
    pub job_ttl: Option<Duration>,
    pub execution_timeout: Option<Duration>,
    pub storage: StorageConfig,
    pub callback_token: Option<String>,
}

/// One execution to schedule
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub execution_id: Uuid,
    pub user_id: String,
    pub code_key: String,
    pub requirements_key: Option<String>,
    pub input_key: Option<String>,
    pub output_key: String,
    pub callback_url: Option<String>,
}

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A prerequisite is missing; no job was created
    #[error("{0}")]
    Configuration(String),

    /// The cluster rejected the job
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Everything a job needs that is not specific to one execution
#[derive(Debug, Clone)]
pub struct Prerequisites {
    pub bucket: String,
    pub region: String,
    pub credentials: StoreCredentials,
    pub callback_url: String,
    pub callback_token: String,
}

pub struct JobScheduler {
    cluster: Arc<dyn ClusterApi>,
    settings: SchedulerSettings,
    watchers: WatcherSet,
}

impl JobScheduler {
    pub fn new(cluster: Arc<dyn ClusterApi>, settings: SchedulerSettings, watchers: WatcherSet) -> Self {
        Self {
            cluster,
            settings,
            watchers,
        }
    }

    /// Checks that a job could be built, without calling the cluster
    pub fn check_prerequisites(&self, callback_url: Option<&str>) -> Result<Prerequisites, SchedulerError> {
        let storage = &self.settings.storage;

        let bucket = storage.bucket.clone().ok_or_else(|| {
            SchedulerError::Configuration(
                "S3_BUCKET_NAME environment variable is not configured.".to_string(),
            )
        })?;

        let credentials = storage.credentials.clone().ok_or_else(|| {
            SchedulerError::Configuration(
                "AWS credentials are not configured for S3 access.".to_string(),
            )
        })?;

        let callback_url = callback_url.map(str::to_string).ok_or_else(|| {
            SchedulerError::Configuration(
                "Missing EXECUTION_CALLBACK_URL environment variable.".to_string(),
            )
        })?;

        let region = storage.region.clone().ok_or_else(|| {
            SchedulerError::Configuration(
                "Missing S3_REGION or AWS_REGION environment variable.".to_string(),
            )
        })?;

        let callback_token = self.settings.callback_token.clone().ok_or_else(|| {
            SchedulerError::Configuration(
                "Missing EXECUTION_UPDATE_TOKEN environment variable.".to_string(),
            )
        })?;

        Ok(Prerequisites {
            bucket,
            region,
            credentials,
            callback_url,
            callback_token,
        })
    }

    /// Creates the job for an execution and starts its watcher
    ///
    /// Returns the job name. The watcher runs in the background; this does
    /// not wait for the job.
    pub async fn schedule(&self, req: ScheduleRequest) -> Result<String, SchedulerError> {
        let prerequisites = self.check_prerequisites(req.callback_url.as_deref())?;

        let env = JobEnvironment {
            credentials: prerequisites.credentials,
            region: prerequisites.region,
            bucket: prerequisites.bucket,
            endpoint: self.settings.storage.endpoint.clone(),
            force_path_style: self.settings.storage.force_path_style,
            code_key: req.code_key,
            requirements_key: req.requirements_key,
            input_key: req.input_key,
            output_key: req.output_key,
            execution_id: req.execution_id,
            user_id: req.user_id,
            callback_url: prerequisites.callback_url,
            callback_token: prerequisites.callback_token,
            timeout: self.settings.execution_timeout,
        };

        let template = JobTemplate {
            image: self.settings.image.clone(),
            ttl_after_finished: self.settings.job_ttl,
            active_deadline: self.settings.execution_timeout.map(|t| t + DEADLINE_SLACK),
        };

        let name = job_name(req.execution_id);
        let job = build_job(&name, &template, &env);

        self.cluster.create_job(&job).await?;

        tracing::info!(
            job = %name,
            execution_id = %req.execution_id,
            "Execution job created"
        );

        self.watchers
            .watch(Arc::clone(&self.cluster), name.clone(), req.execution_id);

        Ok(name)
    }
}
