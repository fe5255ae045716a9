//! Runbox Orchestrator
//!
//! HTTP service that accepts code submissions, stages their artifacts,
//! schedules one isolated cluster job per execution, and records the
//! outcome reported back by the worker.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runbox_artifacts::{ArtifactStore, S3ArtifactStore};

pub mod api;
pub mod cluster;
pub mod config;
pub mod db;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod shutdown;

#[cfg(test)]
pub mod testing;

use crate::api::AppState;
use crate::cluster::{ClusterApi, KubeCluster};
use crate::config::Config;
use crate::repository::{ExecutionRepository, PgExecutionRepository};
use crate::scheduler::{JobScheduler, WatcherSet};
use crate::service::{CallbackReceiver, ExecutionService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runbox_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Runbox Orchestrator...");

    let config = Config::from_env();
    config.validate()?;

    for problem in config.scheduling_problems() {
        tracing::warn!("Executions cannot be scheduled until fixed: {}", problem);
    }

    tracing::info!("Connecting to database...");

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // The cluster client is built once and shared by every component
    let cluster: Arc<dyn ClusterApi> = Arc::new(
        KubeCluster::connect(&config.namespace)
            .await
            .context("Failed to create Kubernetes client")?,
    );

    tracing::info!("Kubernetes client ready (namespace: {})", config.namespace);

    let store = config
        .storage
        .s3_settings()
        .map(|settings| Arc::new(S3ArtifactStore::new(settings)) as Arc<dyn ArtifactStore>);

    let watchers = WatcherSet::new(config.watch_policy());
    let scheduler = JobScheduler::new(cluster, config.scheduler_settings(), watchers.clone());

    let repository: Arc<dyn ExecutionRepository> = Arc::new(PgExecutionRepository::new(pool));
    let executions = ExecutionService::new(
        Arc::clone(&repository),
        store,
        scheduler,
        config.callback_url.clone(),
    );
    let callbacks = CallbackReceiver::new(repository, config.callback_token.clone());

    let app = api::create_router(AppState::new(executions, callbacks));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    let shutdown = shutdown::install_shutdown_handler();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Failed to start server")?;

    tracing::info!(
        "Server stopped, draining {} job watcher(s)",
        watchers.len()
    );
    watchers.shutdown(config.watcher_shutdown_grace).await;

    Ok(())
}
