//! Cluster Module
//!
//! Thin seam over the cluster batch API. The scheduler and the watchers only
//! talk to [`ClusterApi`], so tests can drive them with a scripted fake.

pub mod descriptor;
pub mod kubernetes;

pub use descriptor::{JobTemplate, build_job, job_name};
pub use kubernetes::KubeCluster;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;

/// Completion counters of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobState {
    pub succeeded: bool,
    pub failed: bool,
}

impl JobState {
    pub fn from_job(job: &Job) -> Self {
        let status = job.status.as_ref();
        Self {
            succeeded: status.and_then(|s| s.succeeded).is_some_and(|n| n > 0),
            failed: status.and_then(|s| s.failed).is_some_and(|n| n > 0),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.succeeded || self.failed
    }
}

/// Cluster API errors
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("cluster API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("cluster request failed: {0}")]
    Transport(String),
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => {
                ClusterError::NotFound(response.message)
            }
            kube::Error::Api(response) => ClusterError::Api {
                code: response.code,
                message: response.message,
            },
            other => ClusterError::Transport(other.to_string()),
        }
    }
}

/// Operations the orchestrator needs from the cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submits a job
    async fn create_job(&self, job: &Job) -> Result<(), ClusterError>;

    /// Reads the completion state of a job
    async fn job_state(&self, name: &str) -> Result<JobState, ClusterError>;

    /// Deletes a job and its pods; a job that is already gone is not an error
    async fn delete_job(&self, name: &str) -> Result<(), ClusterError>;
}
