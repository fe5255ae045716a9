//! In-memory execution repository
//!
//! Same semantics as the Postgres repository, kept in a map.

use async_trait::async_trait;
use chrono::Utc;
use runbox_core::domain::execution::{Execution, ExecutionStatus};
use runbox_core::dto::execution::{CreateExecution, ExecutionFilter, ExecutionUpdate};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::execution::{ExecutionRepository, UpdateOutcome};

#[derive(Debug, Default)]
pub struct InMemoryExecutionRepository {
    records: Mutex<HashMap<Uuid, Execution>>,
    unavailable: AtomicBool,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stores a record as-is
    pub fn insert(&self, execution: Execution) {
        self.records
            .lock()
            .unwrap()
            .insert(execution.id, execution);
    }

    fn check_available(&self) -> Result<(), sqlx::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn create(&self, req: &CreateExecution) -> Result<Execution, sqlx::Error> {
        self.check_available()?;

        let now = Utc::now();
        let execution = Execution {
            id: Uuid::new_v4(),
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

        self.insert(execution.clone());
        Ok(execution)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Execution>, sqlx::Error> {
        self.check_available()?;
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, sqlx::Error> {
        self.check_available()?;

        let mut executions: Vec<Execution> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|e| filter.user_id.as_ref().is_none_or(|user| &e.user_id == user))
            .filter(|e| filter.status.is_none_or(|status| e.status == status))
            .cloned()
            .collect();

        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }

    async fn mark_failed(&self, id: Uuid, logs: &str) -> Result<Option<Execution>, sqlx::Error> {
        self.check_available()?;

        let mut records = self.records.lock().unwrap();
        let Some(execution) = records.get_mut(&id) else {
            return Ok(None);
        };

        if execution.status == ExecutionStatus::Running {
            let now = Utc::now();
            execution.status = ExecutionStatus::Failed;
            execution.logs = Some(logs.to_string());
            execution.updated_at = now;
            execution.completed_at = Some(now);
        }

        Ok(Some(execution.clone()))
    }

    async fn apply_update(&self, update: &ExecutionUpdate) -> Result<UpdateOutcome, sqlx::Error> {
        self.check_available()?;

        let mut records = self.records.lock().unwrap();
        let Some(execution) = records.get_mut(&update.id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if execution.is_terminal() {
            return Ok(UpdateOutcome::AlreadyTerminal(execution.clone()));
        }

        let now = Utc::now();
        execution.status = update.status;
        if let Some(logs) = &update.logs {
            execution.logs = Some(logs.clone());
        }
        if let Some(output) = &update.output_file {
            execution.output_file = Some(output.clone());
        }
        execution.updated_at = now;
        if update.status.is_terminal() {
            execution.completed_at = Some(now);
        }

        Ok(UpdateOutcome::Applied(execution.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        self.check_available()?;
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(user: &str) -> CreateExecution {
        CreateExecution {
            user_id: user.to_string(),
            code: "print('hello')".to_string(),
            requirements: None,
            input_file: None,
        }
    }

    fn update(id: Uuid, status: ExecutionStatus) -> ExecutionUpdate {
        ExecutionUpdate {
            id,
            status,
            logs: Some(format!("[runner] {}", status)),
            output_file: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_running() {
        let repo = InMemoryExecutionRepository::new();
        let execution = repo.create(&submission("alice")).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(execution.completed_at.is_none());
        assert_eq!(repo.find_by_id(execution.id).await.unwrap(), Some(execution));
    }

    #[tokio::test]
    async fn test_terminal_update_sets_completed_at() {
        let repo = InMemoryExecutionRepository::new();
        let execution = repo.create(&submission("alice")).await.unwrap();

        let outcome = repo
            .apply_update(&update(execution.id, ExecutionStatus::Success))
            .await
            .unwrap();

        let stored = match outcome {
            UpdateOutcome::Applied(stored) => stored,
            other => panic!("expected update to apply, got {:?}", other),
        };
        assert_eq!(stored.status, ExecutionStatus::Success);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_running_update_keeps_record_open() {
        let repo = InMemoryExecutionRepository::new();
        let execution = repo.create(&submission("alice")).await.unwrap();

        repo.apply_update(&update(execution.id, ExecutionStatus::Running))
            .await
            .unwrap();

        let stored = repo.find_by_id(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Running);
        assert!(stored.completed_at.is_none());
        assert_eq!(stored.logs.as_deref(), Some("[runner] RUNNING"));
    }

    #[tokio::test]
    async fn test_terminal_record_is_not_overwritten() {
        let repo = InMemoryExecutionRepository::new();
        let execution = repo.create(&submission("alice")).await.unwrap();

        repo.apply_update(&update(execution.id, ExecutionStatus::Success))
            .await
            .unwrap();
        let first = repo.find_by_id(execution.id).await.unwrap().unwrap();

        let outcome = repo
            .apply_update(&update(execution.id, ExecutionStatus::Failed))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::AlreadyTerminal(first.clone()));
        assert_eq!(repo.find_by_id(execution.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_update_for_unknown_id() {
        let repo = InMemoryExecutionRepository::new();
        let outcome = repo
            .apply_update(&update(Uuid::new_v4(), ExecutionStatus::Failed))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let repo = InMemoryExecutionRepository::new();
        let older = repo.create(&submission("alice")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let newer = repo.create(&submission("alice")).await.unwrap();
        repo.create(&submission("bob")).await.unwrap();
        repo.mark_failed(older.id, "boom").await.unwrap();

        let filter = ExecutionFilter {
            user_id: Some("alice".to_string()),
            status: None,
        };
        let listed = repo.list(&filter).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let failed_only = ExecutionFilter {
            status: Some(ExecutionStatus::Failed),
            ..filter
        };
        let listed = repo.list(&failed_only).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].logs.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let repo = InMemoryExecutionRepository::new();
        repo.set_unavailable(true);
        assert!(repo.create(&submission("alice")).await.is_err());
    }
}
