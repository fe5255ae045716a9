//! Worker configuration
//!
//! The job environment contract plus a few worker-local settings.

use runbox_core::job_env::{EnvError, JobEnvironment};
use std::path::PathBuf;

const DEFAULT_WORKSPACE: &str = "/workspace";
const DEFAULT_PYTHON: &str = "python3";

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Everything the scheduler told this job
    pub job: JobEnvironment,

    /// Directory holding the code, input and output
    pub workspace: PathBuf,

    /// Interpreter used for pip and the user script
    pub python: String,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Besides the job environment contract:
    /// - WORKSPACE_DIR (optional, default: /workspace)
    /// - PYTHON_BIN (optional, default: python3)
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let job = JobEnvironment::from_lookup(&lookup)?;
        let setting = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Self {
            job,
            workspace: setting("WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE)),
            python: setting("PYTHON_BIN").unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = &self.job.callback_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("callback URL must start with http:// or https://");
        }

        if self.python.is_empty() {
            anyhow::bail!("python binary cannot be empty");
        }

        Ok(())
    }
}
