//! API Module
//!
//! HTTP API layer for the orchestrator.

pub mod error;
pub mod execution;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::{CallbackReceiver, ExecutionService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub executions: Arc<ExecutionService>,
    pub callbacks: Arc<CallbackReceiver>,
}

impl AppState {
    pub fn new(executions: ExecutionService, callbacks: CallbackReceiver) -> Self {
        Self {
            executions: Arc::new(executions),
            callbacks: Arc::new(callbacks),
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Execution endpoints
        .route(
            "/api/executions",
            post(execution::create_execution)
                .get(execution::list_executions)
                .put(execution::update_execution),
        )
        .route(
            "/api/executions/{id}",
            get(execution::get_execution).delete(execution::delete_execution),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
