//! Completion Watcher
//!
//! Frees cluster resources once an execution's job is done. Watchers never
//! touch execution records; the worker's callback owns user-visible status.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::cluster::{ClusterApi, ClusterError};

/// Polling budget for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// How a watcher ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Job reached a terminal state and a delete was issued
    Completed { succeeded: bool },
    /// Attempt budget ran out; the job was deleted anyway
    TimedOut,
    /// Job no longer exists
    Vanished,
    /// Stopped by shutdown before the job finished
    Cancelled,
}

/// Supervised set of running watchers
///
/// Cloning yields a handle to the same set.
#[derive(Debug, Clone)]
pub struct WatcherSet {
    tracker: TaskTracker,
    cancel: CancellationToken,
    policy: WatchPolicy,
}

impl WatcherSet {
    pub fn new(policy: WatchPolicy) -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            policy,
        }
    }

    /// Starts watching a job in the background
    pub fn watch(&self, cluster: Arc<dyn ClusterApi>, job_name: String, execution_id: Uuid) {
        let policy = self.policy;
        let cancel = self.cancel.child_token();

        self.tracker.spawn(async move {
            let outcome = watch_job(cluster.as_ref(), &job_name, policy, &cancel).await;
            tracing::debug!(
                job = %job_name,
                execution_id = %execution_id,
                "Watcher finished: {:?}",
                outcome
            );
        });
    }

    /// Number of watchers still running
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Waits up to `grace` for running watchers, then cancels the rest
    ///
    /// Cancelled watchers leave their jobs in place; the job's
    /// `ttlSecondsAfterFinished` reclaims them.
    pub async fn shutdown(&self, grace: Duration) {
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                "Cancelling {} job watcher(s) after {:?} grace period",
                self.tracker.len(),
                grace
            );
            self.cancel.cancel();
            self.tracker.wait().await;
        }
    }
}

/// Polls one job until it is terminal or the budget runs out, then deletes it
///
/// Errors are logged and never returned.
pub async fn watch_job(
    cluster: &dyn ClusterApi,
    job_name: &str,
    policy: WatchPolicy,
    cancel: &CancellationToken,
) -> WatchOutcome {
    for attempt in 1..=policy.max_attempts {
        match cluster.job_state(job_name).await {
            Ok(state) if state.is_terminal() => {
                let label = if state.succeeded { "succeeded" } else { "failed" };
                cleanup(cluster, job_name, label).await;
                return WatchOutcome::Completed {
                    succeeded: state.succeeded,
                };
            }
            Ok(_) => {
                tracing::trace!(job = %job_name, attempt, "Job still running");
            }
            Err(ClusterError::NotFound(_)) => {
                tracing::info!(job = %job_name, "Job no longer exists, stopping watcher");
                return WatchOutcome::Vanished;
            }
            Err(err) => {
                tracing::warn!(job = %job_name, attempt, "Error polling job: {}", err);
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return WatchOutcome::Cancelled,
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }

    tracing::warn!(
        job = %job_name,
        "Job not finished after {} polls, deleting it",
        policy.max_attempts
    );
    cleanup(cluster, job_name, "timeout").await;
    WatchOutcome::TimedOut
}

async fn cleanup(cluster: &dyn ClusterApi, job_name: &str, reason: &str) {
    match cluster.delete_job(job_name).await {
        Ok(()) => tracing::info!(job = %job_name, "Deleted job after {}", reason),
        Err(err) => tracing::error!(job = %job_name, "Failed to delete job after {}: {}", reason, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::JobState;
    use crate::testing::FakeCluster;

    fn policy(max_attempts: u32) -> WatchPolicy {
        WatchPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_deletes_terminal_job() {
        let cluster = FakeCluster::new();
        cluster.script_states([
            Ok(JobState::default()),
            Ok(JobState {
                succeeded: true,
                failed: false,
            }),
        ]);

        let outcome = watch_job(&cluster, "exec-a", policy(10), &CancellationToken::new()).await;

        assert_eq!(outcome, WatchOutcome::Completed { succeeded: true });
        assert_eq!(cluster.polls(), 2);
        assert_eq!(cluster.deleted(), vec!["exec-a".to_string()]);
    }

    #[tokio::test]
    async fn test_deletes_failed_job() {
        let cluster = FakeCluster::new();
        cluster.script_states([Ok(JobState {
            succeeded: false,
            failed: true,
        })]);

        let outcome = watch_job(&cluster, "exec-b", policy(10), &CancellationToken::new()).await;

        assert_eq!(outcome, WatchOutcome::Completed { succeeded: false });
        assert_eq!(cluster.deleted(), vec!["exec-b".to_string()]);
    }

    #[tokio::test]
    async fn test_exhausted_budget_deletes_anyway() {
        let cluster = FakeCluster::new();

        let outcome = watch_job(&cluster, "exec-stuck", policy(3), &CancellationToken::new()).await;

        assert_eq!(outcome, WatchOutcome::TimedOut);
        assert_eq!(cluster.polls(), 3);
        assert_eq!(cluster.deleted(), vec!["exec-stuck".to_string()]);
    }

    #[tokio::test]
    async fn test_poll_errors_are_tolerated() {
        let cluster = FakeCluster::new();
        cluster.script_states([
            Err(ClusterError::Transport("connection reset".to_string())),
            Err(ClusterError::Api {
                code: 500,
                message: "etcd timeout".to_string(),
            }),
            Ok(JobState {
                succeeded: true,
                failed: false,
            }),
        ]);

        let outcome = watch_job(&cluster, "exec-c", policy(10), &CancellationToken::new()).await;

        assert_eq!(outcome, WatchOutcome::Completed { succeeded: true });
        assert_eq!(cluster.polls(), 3);
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        let cluster = FakeCluster::new();
        cluster.fail_deletes(true);
        cluster.script_states([Ok(JobState {
            succeeded: true,
            failed: false,
        })]);

        let outcome = watch_job(&cluster, "exec-d", policy(10), &CancellationToken::new()).await;

        assert_eq!(outcome, WatchOutcome::Completed { succeeded: true });
        assert!(cluster.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_job_stops_without_delete() {
        let cluster = FakeCluster::new();
        cluster.script_states([Err(ClusterError::NotFound("exec-e".to_string()))]);

        let outcome = watch_job(&cluster, "exec-e", policy(10), &CancellationToken::new()).await;

        assert_eq!(outcome, WatchOutcome::Vanished);
        assert!(cluster.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_polling() {
        let cluster = FakeCluster::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = watch_job(&cluster, "exec-f", policy(100), &cancel).await;

        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert_eq!(cluster.polls(), 1);
        assert!(cluster.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_finished_watchers() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.script_states([Ok(JobState {
            succeeded: true,
            failed: false,
        })]);

        let watchers = WatcherSet::new(policy(10));
        watchers.watch(cluster.clone(), "exec-g".to_string(), Uuid::new_v4());
        watchers.shutdown(Duration::from_secs(5)).await;

        assert!(watchers.is_empty());
        assert_eq!(cluster.deleted(), vec!["exec-g".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_slow_watchers() {
        let cluster = Arc::new(FakeCluster::new());
        let watchers = WatcherSet::new(WatchPolicy {
            interval: Duration::from_secs(60),
            max_attempts: 100,
        });

        watchers.watch(cluster.clone(), "exec-h".to_string(), Uuid::new_v4());
        assert_eq!(watchers.len(), 1);

        watchers.shutdown(Duration::from_millis(20)).await;

        assert!(watchers.is_empty());
        assert!(cluster.deleted().is_empty());
    }
}
