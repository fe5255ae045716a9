//! Language toolchain
//!
//! Installs a submission's dependencies and runs its entry script. The
//! Python toolchain bootstraps its package installer on first use, so the
//! worker runs on a bare interpreter image.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::process::{self, BASE_ENV, CommandSpec, ProcessError, ProcessOutput};

/// Extra worker variables pip may see, for mirrors and proxies
const PIP_ENV: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "PIP_INDEX_URL",
    "PIP_EXTRA_INDEX_URL",
];

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("failed to bootstrap package installer: {0}")]
    Bootstrap(String),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Where and how the entry script runs
#[derive(Debug, Clone)]
pub struct ScriptContext {
    pub cwd: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub limit: Option<Duration>,
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Installs the packages listed in a requirements file
    async fn install_requirements(
        &self,
        requirements: &Path,
        cwd: &Path,
    ) -> Result<ProcessOutput, ToolchainError>;

    /// Runs the entry script with `INPUT_DIR` and `OUTPUT_DIR` set
    ///
    /// The script sees none of the worker's credentials.
    async fn run_script(
        &self,
        script: &Path,
        ctx: &ScriptContext,
    ) -> Result<ProcessOutput, ToolchainError>;
}

/// CPython with pip
pub struct PythonToolchain {
    python: String,
    pip_ready: OnceCell<()>,
}

impl PythonToolchain {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            pip_ready: OnceCell::new(),
        }
    }

    fn python(&self) -> CommandSpec {
        CommandSpec::new(&self.python)
    }

    /// Makes sure `python -m pip` works, installing pip once if needed
    async fn ensure_pip(&self) -> Result<(), ToolchainError> {
        self.pip_ready
            .get_or_try_init(|| async {
                if self.pip_available().await {
                    return Ok(());
                }

                warn!("pip is not available, bootstrapping it with ensurepip");
                let output = process::run(
                    &self.python().arg("-m").arg("ensurepip").arg("--upgrade"),
                    None,
                )
                .await
                .map_err(|e| ToolchainError::Bootstrap(e.to_string()))?;

                if !output.success() || !self.pip_available().await {
                    return Err(ToolchainError::Bootstrap(format!(
                        "ensurepip exited with {}: {}",
                        output.code_label(),
                        output.stderr.trim()
                    )));
                }

                info!("pip bootstrapped");
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn pip_available(&self) -> bool {
        process::run(&self.python().arg("-m").arg("pip").arg("--version"), None)
            .await
            .is_ok_and(|output| output.success())
    }
}

#[async_trait]
impl Toolchain for PythonToolchain {
    async fn install_requirements(
        &self,
        requirements: &Path,
        cwd: &Path,
    ) -> Result<ProcessOutput, ToolchainError> {
        self.ensure_pip().await?;

        let spec = self
            .python()
            .arg("-m")
            .arg("pip")
            .arg("install")
            .arg("--no-cache-dir")
            .arg("-r")
            .arg(requirements.to_string_lossy())
            .cwd(cwd)
            .isolated(BASE_ENV)
            .isolated(PIP_ENV);

        Ok(process::run(&spec, None).await?)
    }

    async fn run_script(
        &self,
        script: &Path,
        ctx: &ScriptContext,
    ) -> Result<ProcessOutput, ToolchainError> {
        let spec = self
            .python()
            .arg(script.to_string_lossy())
            .cwd(&ctx.cwd)
            .isolated(BASE_ENV)
            .env("INPUT_DIR", ctx.input_dir.to_string_lossy())
            .env("OUTPUT_DIR", ctx.output_dir.to_string_lossy());

        Ok(process::run(&spec, ctx.limit).await?)
    }
}
