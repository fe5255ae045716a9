//! Execution domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution record
///
/// One user code run. Created by the orchestrator when a submission arrives
/// and updated either by a scheduling failure or by the worker's report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: Uuid,
    pub user_id: String,
    pub code: String,
    pub requirements: Option<String>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub status: ExecutionStatus,
    pub logs: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Returns true once the record reached SUCCESS or FAILED
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    /// Terminal states are the only ones that set `completed_at`
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution status '{0}'")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for ExecutionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(ExecutionStatus::Running),
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "FAILED" => Ok(ExecutionStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        let parsed: ExecutionStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, ExecutionStatus::Failed);
        assert!(serde_json::from_str::<ExecutionStatus>("\"DONE\"").is_err());
    }

    #[test]
    fn test_status_from_str_is_case_insensitive() {
        assert_eq!("running".parse(), Ok(ExecutionStatus::Running));
        assert_eq!("Success".parse(), Ok(ExecutionStatus::Success));
        assert!("queued".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_record_uses_camel_case() {
        let now = Utc::now();
        let execution = Execution {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            code: "print('hi')".to_string(),
            requirements: None,
            input_file: Some("uploads/in.zip".to_string()),
            output_file: None,
            status: ExecutionStatus::Running,
            logs: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let json = serde_json::to_value(&execution).unwrap();
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["inputFile"], "uploads/in.zip");
        assert_eq!(json["status"], "RUNNING");
        assert!(json["completedAt"].is_null());
    }
}
