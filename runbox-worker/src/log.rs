//! Run log
//!
//! Ordered, human-readable record of what the worker did. Every line is
//! `[section] message`; the joined log is what the user sees on the
//! execution record.

use std::sync::Mutex;

pub const RUNNER: &str = "runner";
pub const PIP_STDOUT: &str = "pip stdout";
pub const PIP_STDERR: &str = "pip stderr";
pub const CODE_STDOUT: &str = "code stdout";
pub const CODE_STDERR: &str = "code stderr";

/// Thread-safe run log
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Mutex<Vec<String>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line, mirroring it to the process log
    pub fn append(&self, section: &str, message: impl AsRef<str>) {
        let line = format!("[{}] {}", section, message.as_ref());
        tracing::info!("{}", line);
        self.lines.lock().unwrap().push(line);
    }

    /// Appends trimmed subprocess output, skipping it when blank
    pub fn append_output(&self, section: &str, output: &str) {
        let trimmed = output.trim();
        if !trimmed.is_empty() {
            self.append(section, trimmed);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// The full log as sent in the status report
    pub fn joined(&self) -> String {
        self.lines().join("\n")
    }
}
