//! Job descriptor
//!
//! Builds the `batch/v1` Job that runs the worker image for one execution.

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use runbox_core::job_env::JobEnvironment;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

const APP_LABEL: &str = "app.kubernetes.io/name";
const COMPONENT_LABEL: &str = "app.kubernetes.io/component";
const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
const APP_NAME: &str = "execution-runner";
const CONTAINER_NAME: &str = "runner";
const WORKER_COMMAND: &str = "runbox-worker";

/// Cluster-wide job settings
#[derive(Debug, Clone)]
pub struct JobTemplate {
    pub image: String,
    /// Cleanup for finished jobs nobody deleted
    pub ttl_after_finished: Option<Duration>,
    /// Hard limit on the whole job
    pub active_deadline: Option<Duration>,
}

/// Job name for an execution: `exec-{id}-{random suffix}`
///
/// The suffix keeps a retried submission from colliding with a job that is
/// still being cleaned up.
pub fn job_name(execution_id: Uuid) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let raw = format!(
        "exec-{}-{}",
        execution_id.to_string().to_lowercase(),
        &suffix[..8]
    );

    raw.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect()
}

/// Builds the job descriptor for one execution
pub fn build_job(name: &str, template: &JobTemplate, env: &JobEnvironment) -> Job {
    let instance = env.execution_id.to_string();

    let job_labels = BTreeMap::from([
        (APP_LABEL.to_string(), APP_NAME.to_string()),
        (COMPONENT_LABEL.to_string(), "worker".to_string()),
        (INSTANCE_LABEL.to_string(), instance.clone()),
    ]);
    let pod_labels = BTreeMap::from([
        (APP_LABEL.to_string(), APP_NAME.to_string()),
        (INSTANCE_LABEL.to_string(), instance),
    ]);

    let env_vars = env
        .to_vars()
        .into_iter()
        .map(|(name, value)| EnvVar {
            name,
            value: Some(value),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(template.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec![WORKER_COMMAND.to_string()]),
        env: Some(env_vars),
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(job_labels),
            ..Default::default()
        },
        spec: Some(JobSpec {
            // A failed user program is an outcome, not a fault to retry
            backoff_limit: Some(0),
            ttl_seconds_after_finished: template.ttl_after_finished.map(seconds_i32),
            active_deadline_seconds: template
                .active_deadline
                .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX)),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn seconds_i32(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}
