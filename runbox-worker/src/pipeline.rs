//! Execution pipeline
//!
//! Fetch code, install requirements, unpack input, run, package output,
//! upload. Each stage appends to the run log; the first failing stage stops
//! the run.

use bytes::Bytes;
use runbox_artifacts::{ArtifactError, ArtifactStore, CONTENT_TYPE_ZIP};
use runbox_core::job_env::JobEnvironment;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::archive::{self, ArchiveError};
use crate::log::{CODE_STDERR, CODE_STDOUT, PIP_STDERR, PIP_STDOUT, RUNNER, RunLog};
use crate::toolchain::{ScriptContext, Toolchain, ToolchainError};

const SCRIPT_NAME: &str = "main.py";
const REQUIREMENTS_NAME: &str = "requirements.txt";

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Failed to download {key}: {source}")]
    Download {
        key: String,
        #[source]
        source: ArtifactError,
    },

    #[error("Failed to install requirements.")]
    InstallFailed,

    #[error("Execution failed with exit code {0}")]
    ExecutionFailed(String),

    #[error("Execution exceeded the {0:?} time limit and was killed")]
    TimedOut(Duration),

    #[error("Failed to extract input archive: {0}")]
    Extract(#[source] ArchiveError),

    #[error("Failed to package output directory: {0}")]
    Package(#[source] ArchiveError),

    #[error("Failed to upload output archive: {0}")]
    Upload(#[source] ArtifactError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("Workspace error at {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StageError {
    fn workspace(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Workspace {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Directory layout of one run
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            root,
        }
    }

    /// Creates the input and output directories
    pub async fn prepare(&self) -> Result<(), StageError> {
        for dir in [&self.input_dir, &self.output_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(StageError::workspace(dir))?;
        }
        Ok(())
    }

    pub fn script_path(&self) -> PathBuf {
        self.root.join(SCRIPT_NAME)
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.root.join(REQUIREMENTS_NAME)
    }
}

/// One run of the pipeline
pub struct Pipeline<'a> {
    pub job: &'a JobEnvironment,
    pub store: &'a dyn ArtifactStore,
    pub toolchain: &'a dyn Toolchain,
    pub workspace: &'a Workspace,
    pub log: &'a RunLog,
}

impl Pipeline<'_> {
    /// Runs every stage, returning the key the output was uploaded to
    pub async fn run(&self) -> Result<String, StageError> {
        self.workspace.prepare().await?;

        self.fetch_code().await?;
        self.install_requirements().await?;
        self.unpack_input().await?;
        self.execute().await?;
        self.upload_output().await
    }

    async fn download(&self, key: &str) -> Result<Bytes, StageError> {
        self.store
            .get_object(key)
            .await
            .map_err(|source| StageError::Download {
                key: key.to_string(),
                source,
            })
    }

    async fn fetch_code(&self) -> Result<(), StageError> {
        let code = self.download(&self.job.code_key).await?;
        let path = self.workspace.script_path();
        fs::write(&path, &code)
            .await
            .map_err(StageError::workspace(&path))?;
        self.log
            .append(RUNNER, format!("Downloaded code from {}", self.job.code_key));
        Ok(())
    }

    async fn install_requirements(&self) -> Result<(), StageError> {
        let Some(key) = &self.job.requirements_key else {
            self.log
                .append(RUNNER, "No requirements specified; skipping install.");
            return Ok(());
        };

        let requirements = self.download(key).await?;
        let path = self.workspace.requirements_path();
        fs::write(&path, &requirements)
            .await
            .map_err(StageError::workspace(&path))?;
        self.log
            .append(RUNNER, format!("Downloaded requirements from {}", key));

        let output = self
            .toolchain
            .install_requirements(&path, &self.workspace.root)
            .await?;
        self.log.append_output(PIP_STDOUT, &output.stdout);
        self.log.append_output(PIP_STDERR, &output.stderr);

        if !output.success() {
            return Err(StageError::InstallFailed);
        }
        Ok(())
    }

    async fn unpack_input(&self) -> Result<(), StageError> {
        let Some(key) = &self.job.input_key else {
            self.log.append(RUNNER, "No input file provided.");
            return Ok(());
        };

        let data = self.download(key).await?;
        self.log.append(RUNNER, format!("Downloaded input from {}", key));

        let dest = self.workspace.input_dir.clone();
        let names = tokio::task::spawn_blocking(move || archive::extract(&data, &dest))
            .await?
            .map_err(StageError::Extract)?;
        if names.is_empty() {
            self.log.append(RUNNER, "Input archive is empty.");
        } else {
            self.log
                .append(RUNNER, format!("Input archive contents: {}", names.join(", ")));
        }
        self.log.append(RUNNER, "Extracted input archive.");
        Ok(())
    }

    async fn execute(&self) -> Result<(), StageError> {
        let ctx = ScriptContext {
            cwd: self.workspace.root.clone(),
            input_dir: self.workspace.input_dir.clone(),
            output_dir: self.workspace.output_dir.clone(),
            limit: self.job.timeout,
        };

        let output = self
            .toolchain
            .run_script(&self.workspace.script_path(), &ctx)
            .await?;
        self.log.append_output(CODE_STDOUT, &output.stdout);
        self.log.append_output(CODE_STDERR, &output.stderr);

        if output.timed_out {
            return Err(StageError::TimedOut(self.job.timeout.unwrap_or_default()));
        }
        if !output.success() {
            return Err(StageError::ExecutionFailed(output.code_label()));
        }

        self.log.append(RUNNER, format!("Executed {}", SCRIPT_NAME));
        Ok(())
    }

    async fn upload_output(&self) -> Result<String, StageError> {
        let dir = self.workspace.output_dir.clone();
        let data = tokio::task::spawn_blocking(move || archive::pack_dir(&dir))
            .await?
            .map_err(StageError::Package)?;
        self.log.append(
            RUNNER,
            format!("Packaged output directory ({} bytes)", data.len()),
        );

        let key = &self.job.output_key;
        self.store
            .put_object(key, Bytes::from(data), CONTENT_TYPE_ZIP)
            .await
            .map_err(StageError::Upload)?;
        self.log
            .append(RUNNER, format!("Uploaded output archive to {}", key));

        Ok(key.clone())
    }
}
