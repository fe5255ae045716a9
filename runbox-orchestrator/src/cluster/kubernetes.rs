//! Kubernetes-backed cluster client

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::Client;
use kube::api::{Api, DeleteParams, PostParams, PropagationPolicy};

use super::{ClusterApi, ClusterError, JobState};

/// Batch API client bound to one namespace
#[derive(Clone)]
pub struct KubeCluster {
    jobs: Api<Job>,
}

impl KubeCluster {
    /// Connects using in-cluster config when available, else the local kubeconfig
    pub async fn connect(namespace: &str) -> Result<Self, kube::Error> {
        let client = Client::try_default().await?;
        Ok(Self {
            jobs: Api::namespaced(client, namespace),
        })
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn create_job(&self, job: &Job) -> Result<(), ClusterError> {
        self.jobs.create(&PostParams::default(), job).await?;
        Ok(())
    }

    async fn job_state(&self, name: &str) -> Result<JobState, ClusterError> {
        let job = self.jobs.get(name).await?;
        Ok(JobState::from_job(&job))
    }

    async fn delete_job(&self, name: &str) -> Result<(), ClusterError> {
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            grace_period_seconds: Some(0),
            ..Default::default()
        };

        match self.jobs.delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(err) => match ClusterError::from(err) {
                ClusterError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}
