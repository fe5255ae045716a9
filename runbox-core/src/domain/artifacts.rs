//! Artifact key layout
//!
//! Every execution owns the keys under `executions/{id}/`, so concurrent
//! executions never write to the same object.

use uuid::Uuid;

/// Object store keys staged for one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub code: String,
    pub requirements: String,
    pub output: String,
}

impl ArtifactKeys {
    pub fn for_execution(id: Uuid) -> Self {
        let base = format!("executions/{}", id);
        Self {
            code: format!("{}/main.py", base),
            requirements: format!("{}/requirements.txt", base),
            output: format!("{}/output.zip", base),
        }
    }
}
