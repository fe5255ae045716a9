//! Subprocess execution
//!
//! Runs a command to completion with captured stdout and stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Worker variables a sandboxed command may still see
pub const BASE_ENV: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TZ", "TMPDIR"];

/// How long to keep reading pipes after the process is gone
///
/// Orphaned grandchildren can hold a pipe open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Command to run
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Start from an empty environment instead of the worker's
    pub clear_env: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Drops the worker's environment except for the listed variables
    ///
    /// The job credentials and the callback token live in the worker's
    /// environment and must never reach submitted code.
    pub fn isolated(mut self, keep: &[&str]) -> Self {
        self.clear_env = true;
        for name in keep {
            if let Ok(value) = std::env::var(name) {
                self.env.push((name.to_string(), value));
            }
        }
        self
    }

    /// `program arg1 arg2 ...`, for messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Killed for exceeding its time limit; output is what it wrote until then
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code as shown to users
    pub fn code_label(&self) -> String {
        self.code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

type Captured = Arc<Mutex<Vec<u8>>>;

/// Reads a pipe into a shared buffer so a partial read survives an abort
fn capture<R>(pipe: Option<R>) -> (Captured, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = Captured::default();
    let sink = Arc::clone(&buffer);

    let reader = tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        let mut chunk = [0u8; 8192];
        while let Ok(read) = pipe.read(&mut chunk).await {
            if read == 0 {
                break;
            }
            sink.lock().unwrap().extend_from_slice(&chunk[..read]);
        }
    });

    (buffer, reader)
}

fn text(buffer: &Captured) -> String {
    String::from_utf8_lossy(&buffer.lock().unwrap()).into_owned()
}

/// Runs a command and waits for it, killing it if `limit` elapses first
pub async fn run(spec: &CommandSpec, limit: Option<Duration>) -> Result<ProcessOutput, ProcessError> {
    debug!("Running: {}", spec.display());

    let mut command = Command::new(&spec.program);
    if spec.clear_env {
        command.env_clear();
    }
    command
        .args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.cwd {
        command.current_dir(dir);
    }

    let spawn_error = |source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    };

    let mut child = command.spawn().map_err(spawn_error)?;
    let (stdout, mut stdout_reader) = capture(child.stdout.take());
    let (stderr, mut stderr_reader) = capture(child.stderr.take());

    let waited = match limit {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    let (code, timed_out) = match waited {
        Some(status) => (status.map_err(spawn_error)?.code(), false),
        None => {
            warn!("'{}' exceeded its time limit, killing it", spec.program);
            // An error here means the child already exited
            let _ = child.kill().await;
            (None, true)
        }
    };

    let drained = tokio::time::timeout(DRAIN_GRACE, async {
        let _ = (&mut stdout_reader).await;
        let _ = (&mut stderr_reader).await;
    })
    .await;
    if drained.is_err() {
        stdout_reader.abort();
        stderr_reader.abort();
    }

    Ok(ProcessOutput {
        code,
        stdout: text(&stdout),
        stderr: text(&stderr),
        timed_out,
    })
}
