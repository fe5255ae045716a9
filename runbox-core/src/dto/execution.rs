//! Execution DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::execution::{Execution, ExecutionStatus};

/// Request to create and schedule a new execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExecution {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub input_file: Option<String>,
}

impl CreateExecution {
    /// Requirements text, if it contains anything besides whitespace
    pub fn effective_requirements(&self) -> Option<&str> {
        self.requirements
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Input artifact key, ignoring empty strings
    pub fn effective_input(&self) -> Option<&str> {
        self.input_file.as_deref().filter(|key| !key.is_empty())
    }
}

/// Status report sent by the worker (or resent by an operator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUpdate {
    pub id: Uuid,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

/// Query for listing a user's executions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFilter {
    pub user_id: Option<String>,
    pub status: Option<ExecutionStatus>,
}

/// Response body carrying one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub execution: Execution,
}

/// Response body carrying a list of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionListResponse {
    pub executions: Vec<Execution>,
}
