//! Execution Repository
//!
//! Handles all database operations related to execution records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runbox_core::domain::execution::{Execution, ExecutionStatus};
use runbox_core::dto::execution::{CreateExecution, ExecutionFilter, ExecutionUpdate};
use sqlx::PgPool;
use uuid::Uuid;

/// Result of applying a status report to a record
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The record was RUNNING and now reflects the report
    Applied(Execution),
    /// The record was already terminal; the report was ignored
    AlreadyTerminal(Execution),
    /// No record with this id
    NotFound,
}

/// Record store for executions
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Creates a RUNNING record for a submission
    async fn create(&self, req: &CreateExecution) -> Result<Execution, sqlx::Error>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Execution>, sqlx::Error>;

    /// Lists executions newest first
    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, sqlx::Error>;

    /// Moves a RUNNING record to FAILED with an explanatory log
    ///
    /// Returns the record as stored afterwards, or `None` if it does not exist.
    async fn mark_failed(&self, id: Uuid, logs: &str) -> Result<Option<Execution>, sqlx::Error>;

    /// Applies a worker report unless the record is already terminal
    async fn apply_update(&self, update: &ExecutionUpdate) -> Result<UpdateOutcome, sqlx::Error>;

    /// Deletes a record, returning whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error>;
}

/// Postgres implementation of ExecutionRepository
#[derive(Debug, Clone)]
pub struct PgExecutionRepository {
    pool: PgPool,
}

impl PgExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EXECUTION_COLUMNS: &str = r#"
    id, user_id, code, requirements, input_file, output_file,
    status, logs, created_at, updated_at, completed_at
"#;

#[async_trait]
impl ExecutionRepository for PgExecutionRepository {
    async fn create(&self, req: &CreateExecution) -> Result<Execution, sqlx::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let execution = Execution {
            id,
            user_id: req.user_id.clone(),
            code: req.code.clone(),
            requirements: req.effective_requirements().map(str::to_string),
            input_file: req.effective_input().map(str::to_string),
            output_file: None,
            status: ExecutionStatus::Running,
            logs: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO executions (
                id, user_id, code, requirements, input_file,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&execution.user_id)
        .bind(&execution.code)
        .bind(&execution.requirements)
        .bind(&execution.input_file)
        .bind(ExecutionStatus::Running.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(execution)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Execution>, sqlx::Error> {
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {} FROM executions WHERE id = $1",
            EXECUTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ExecutionRow>(&format!(
            r#"
            SELECT {}
            FROM executions
            WHERE ($1::VARCHAR IS NULL OR user_id = $1)
              AND ($2::VARCHAR IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            EXECUTION_COLUMNS
        ))
        .bind(&filter.user_id)
        .bind(filter.status.map(ExecutionStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn mark_failed(&self, id: Uuid, logs: &str) -> Result<Option<Execution>, sqlx::Error> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE executions
            SET status = $1, logs = $2, updated_at = $3, completed_at = $3
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(ExecutionStatus::Failed.as_str())
        .bind(logs)
        .bind(now)
        .bind(id)
        .bind(ExecutionStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await
    }

    async fn apply_update(&self, update: &ExecutionUpdate) -> Result<UpdateOutcome, sqlx::Error> {
        let now = Utc::now();

        // The status guard makes the first terminal report win
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            r#"
            UPDATE executions
            SET status = $1,
                logs = COALESCE($2, logs),
                output_file = COALESCE($3, output_file),
                updated_at = $4,
                completed_at = CASE WHEN $5 THEN $4 ELSE completed_at END
            WHERE id = $6 AND status = $7
            RETURNING {}
            "#,
            EXECUTION_COLUMNS
        ))
        .bind(update.status.as_str())
        .bind(&update.logs)
        .bind(&update.output_file)
        .bind(now)
        .bind(update.status.is_terminal())
        .bind(update.id)
        .bind(ExecutionStatus::Running.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(UpdateOutcome::Applied(row.into()));
        }

        Ok(match self.find_by_id(update.id).await? {
            Some(existing) => UpdateOutcome::AlreadyTerminal(existing),
            None => UpdateOutcome::NotFound,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM executions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn string_to_status(s: &str) -> ExecutionStatus {
    s.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown execution status '{}' in database, treating as FAILED", s);
        ExecutionStatus::Failed
    })
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    user_id: String,
    code: String,
    requirements: Option<String>,
    input_file: Option<String>,
    output_file: Option<String>,
    status: String,
    logs: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<ExecutionRow> for Execution {
    fn from(row: ExecutionRow) -> Self {
        Execution {
            id: row.id,
            user_id: row.user_id,
            code: row.code,
            requirements: row.requirements,
            input_file: row.input_file,
            output_file: row.output_file,
            status: string_to_status(&row.status),
            logs: row.logs,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}
