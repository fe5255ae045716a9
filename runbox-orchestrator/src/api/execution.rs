//! Execution API Handlers
//!
//! HTTP endpoints for submitting, inspecting and completing executions.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use runbox_core::domain::execution::ExecutionStatus;
use runbox_core::dto::execution::{
    CreateExecution, ExecutionFilter, ExecutionListResponse, ExecutionResponse, ExecutionUpdate,
};
use runbox_core::job_env::EXECUTION_TOKEN_HEADER;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::repository::UpdateOutcome;

// =============================================================================
// Submission and Queries
// =============================================================================

/// POST /api/executions
/// Create an execution and schedule its job
pub async fn create_execution(
    State(state): State<AppState>,
    Json(req): Json<CreateExecution>,
) -> ApiResult<(StatusCode, Json<ExecutionResponse>)> {
    tracing::info!("Submitting execution for user: {}", req.user_id);

    let execution = state.executions.submit(req).await?;

    Ok((StatusCode::CREATED, Json(ExecutionResponse { execution })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExecutionsQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
}

/// GET /api/executions?userId=&status=
/// List a user's executions, newest first
pub async fn list_executions(
    State(state): State<AppState>,
    Query(params): Query<ListExecutionsQuery>,
) -> ApiResult<Json<ExecutionListResponse>> {
    tracing::debug!("Listing executions for user: {:?}", params.user_id);

    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ExecutionStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let executions = state
        .executions
        .list(ExecutionFilter {
            user_id: params.user_id,
            status,
        })
        .await?;

    Ok(Json(ExecutionListResponse { executions }))
}

/// GET /api/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecutionResponse>> {
    tracing::debug!("Getting execution: {}", id);

    let execution = state.executions.get(id).await?;

    Ok(Json(ExecutionResponse { execution }))
}

/// DELETE /api/executions/{id}
pub async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.executions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Worker Callback
// =============================================================================

/// PUT /api/executions
/// Apply a worker's status report
///
/// The token is checked before the body is even parsed.
pub async fn update_execution(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let token = headers
        .get(EXECUTION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(err) = state.callbacks.authorize(token) {
        tracing::warn!("Rejected status report with missing or invalid token");
        return Err(err.into());
    }

    let update: ExecutionUpdate = serde_json::from_slice(&body).map_err(|e| {
        ApiError::BadRequest(format!("Invalid status report: {}", e))
    })?;

    tracing::debug!("Status report for {}: {}", update.id, update.status);

    let outcome = state.callbacks.receive(update).await?;

    Ok(Json(serde_json::json!({
        "applied": matches!(outcome, UpdateOutcome::Applied(_)),
    })))
}
