//! Runbox Worker
//!
//! Entrypoint of an execution job. Everything it needs arrives through the
//! job environment: it fetches the submission from the artifact store,
//! installs requirements, runs the script, uploads the output archive and
//! reports the final status to the orchestrator.
//!
//! Exit codes: 0 on success, 1 when the run failed, 2 when the job
//! environment could not be read.

mod archive;
mod config;
mod log;
mod pipeline;
mod process;
mod reporter;
mod runtime;
mod toolchain;

#[cfg(test)]
mod testing;

use anyhow::Result;
use runbox_artifacts::{S3ArtifactStore, S3Settings};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::pipeline::Workspace;
use crate::reporter::HttpStatusReporter;
use crate::runtime::EXIT_CONFIG;
use crate::toolchain::PythonToolchain;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runbox_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Worker could not start: {:#}", e);
            EXIT_CONFIG
        }
    };

    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let config = Config::from_env()?;
    config.validate()?;

    let job = &config.job;
    info!(
        execution_id = %job.execution_id,
        user_id = %job.user_id,
        "Starting execution"
    );

    let store = S3ArtifactStore::new(S3Settings {
        bucket: job.bucket.clone(),
        region: job.region.clone(),
        access_key_id: job.credentials.access_key_id.clone(),
        secret_access_key: job.credentials.secret_access_key.clone(),
        session_token: job.credentials.session_token.clone(),
        endpoint: job.endpoint.clone(),
        force_path_style: job.force_path_style,
    });
    let toolchain = PythonToolchain::new(&config.python);
    let reporter = HttpStatusReporter::new(&job.callback_url, &job.callback_token)?;
    let workspace = Workspace::new(&config.workspace);

    let outcome = runtime::execute(job, &store, &toolchain, &workspace, &reporter).await;

    info!(
        execution_id = %job.execution_id,
        status = %outcome.update.status,
        delivered = outcome.delivered,
        "Worker finished"
    );

    Ok(outcome.exit_code())
}
