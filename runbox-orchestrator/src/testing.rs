//! Test doubles shared by the orchestrator's unit tests

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::cluster::{ClusterApi, ClusterError, JobState};

/// Scripted in-memory cluster
///
/// `job_state` replays scripted results in order and reports a pending job
/// once the script is exhausted.
#[derive(Default)]
pub struct FakeCluster {
    created: Mutex<Vec<Job>>,
    states: Mutex<VecDeque<Result<JobState, ClusterError>>>,
    deleted: Mutex<Vec<String>>,
    polls: AtomicUsize,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_states<I>(&self, states: I)
    where
        I: IntoIterator<Item = Result<JobState, ClusterError>>,
    {
        self.states.lock().unwrap().extend(states);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<Job> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_job(&self, job: &Job) -> Result<(), ClusterError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClusterError::Api {
                code: 403,
                message: "jobs.batch is forbidden".to_string(),
            });
        }
        self.created.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn job_state(&self, _name: &str) -> Result<JobState, ClusterError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(JobState::default()))
    }

    async fn delete_job(&self, name: &str) -> Result<(), ClusterError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClusterError::Transport("connection refused".to_string()));
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
