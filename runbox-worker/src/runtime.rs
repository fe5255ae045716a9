//! Worker runtime
//!
//! Runs the pipeline once, reports the outcome and decides the exit code.

use runbox_artifacts::ArtifactStore;
use runbox_core::domain::execution::ExecutionStatus;
use runbox_core::dto::execution::ExecutionUpdate;
use runbox_core::job_env::JobEnvironment;
use tracing::{error, info};

use crate::log::{RUNNER, RunLog};
use crate::pipeline::{Pipeline, Workspace};
use crate::reporter::StatusReporter;
use crate::toolchain::Toolchain;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

/// Result of one worker run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub update: ExecutionUpdate,
    /// Whether the orchestrator acknowledged the report
    pub delivered: bool,
}

impl RunOutcome {
    /// Process exit code; independent of report delivery
    pub fn exit_code(&self) -> i32 {
        match self.update.status {
            ExecutionStatus::Success => EXIT_SUCCESS,
            _ => EXIT_FAILED,
        }
    }
}

pub async fn execute(
    job: &JobEnvironment,
    store: &dyn ArtifactStore,
    toolchain: &dyn Toolchain,
    workspace: &Workspace,
    reporter: &dyn StatusReporter,
) -> RunOutcome {
    let log = RunLog::new();
    let pipeline = Pipeline {
        job,
        store,
        toolchain,
        workspace,
        log: &log,
    };

    let (status, output_file) = match pipeline.run().await {
        Ok(key) => {
            info!(execution_id = %job.execution_id, "Execution finished");
            (ExecutionStatus::Success, Some(key))
        }
        Err(e) => {
            error!(execution_id = %job.execution_id, "Execution failed: {}", e);
            log.append(RUNNER, e.to_string());
            (ExecutionStatus::Failed, None)
        }
    };

    let update = ExecutionUpdate {
        id: job.execution_id,
        status,
        logs: Some(log.joined()),
        output_file,
    };

    let delivered = match reporter.report(&update).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                execution_id = %job.execution_id,
                "Failed to send execution update: {:#}", e
            );
            false
        }
    };

    RunOutcome { update, delivered }
}
