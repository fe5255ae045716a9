//! Test doubles shared by the worker's unit tests

use async_trait::async_trait;
use runbox_core::domain::execution::ExecutionStatus;
use runbox_core::dto::execution::ExecutionUpdate;
use runbox_core::job_env::{JobEnvironment, StoreCredentials};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::process::ProcessOutput;
use crate::reporter::StatusReporter;
use crate::toolchain::{ScriptContext, Toolchain, ToolchainError};

pub fn job() -> JobEnvironment {
    JobEnvironment {
        credentials: StoreCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        },
        region: "us-east-2".to_string(),
        bucket: "runbox".to_string(),
        endpoint: None,
        force_path_style: false,
        code_key: "executions/1/main.py".to_string(),
        requirements_key: None,
        input_key: None,
        output_key: "executions/1/output.zip".to_string(),
        execution_id: Uuid::parse_str("6f1c2f5e-8d7a-4c51-9a61-3f0e2b7d9c10").unwrap(),
        user_id: "alice".to_string(),
        callback_url: "http://orchestrator:8080/api/executions".to_string(),
        callback_token: "token".to_string(),
        timeout: None,
    }
}

pub fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Toolchain returning canned process results
pub struct ScriptedToolchain {
    pub install: ProcessOutput,
    pub script: ProcessOutput,
    /// Files the "script" writes into the output directory
    pub outputs: Vec<(String, String)>,
    pub fail_bootstrap: bool,
    pub(crate) script_runs: AtomicUsize,
}

impl Default for ScriptedToolchain {
    fn default() -> Self {
        Self {
            install: ProcessOutput::exited(0, "", ""),
            script: ProcessOutput::exited(0, "", ""),
            outputs: Vec::new(),
            fail_bootstrap: false,
            script_runs: AtomicUsize::new(0),
        }
    }
}

impl ScriptedToolchain {
    pub fn script_runs(&self) -> usize {
        self.script_runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Toolchain for ScriptedToolchain {
    async fn install_requirements(
        &self,
        _requirements: &Path,
        _cwd: &Path,
    ) -> Result<ProcessOutput, ToolchainError> {
        if self.fail_bootstrap {
            return Err(ToolchainError::Bootstrap(
                "No module named ensurepip".to_string(),
            ));
        }
        Ok(self.install.clone())
    }

    async fn run_script(
        &self,
        _script: &Path,
        ctx: &ScriptContext,
    ) -> Result<ProcessOutput, ToolchainError> {
        self.script_runs.fetch_add(1, Ordering::SeqCst);
        for (name, body) in &self.outputs {
            std::fs::write(ctx.output_dir.join(name), body).unwrap();
        }
        Ok(self.script.clone())
    }
}

/// Reporter that records every update it is given
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<ExecutionUpdate>>,
    pub unreachable: bool,
}

impl RecordingReporter {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn reports(&self) -> Vec<ExecutionUpdate> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<ExecutionStatus> {
        self.reports.lock().unwrap().last().map(|u| u.status)
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(&self, update: &ExecutionUpdate) -> anyhow::Result<()> {
        self.reports.lock().unwrap().push(update.clone());
        if self.unreachable {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}
