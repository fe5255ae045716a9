//! Execution command handlers
//!
//! Handles submitting code, listing and inspecting executions, deleting
//! them, and resending a status report an execution never delivered.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use runbox_client::{ClientError, OrchestratorClient};
use runbox_core::domain::execution::{Execution, ExecutionStatus};
use runbox_core::dto::execution::{CreateExecution, ExecutionUpdate};
use uuid::Uuid;

use crate::config::Config;

/// Execution subcommands
#[derive(Subcommand)]
pub enum ExecutionCommands {
    /// Submit a script for execution
    Submit {
        /// Path to the script to run
        code: String,

        /// Owner of the execution
        #[arg(short, long)]
        user: String,

        /// Path to a requirements file
        #[arg(short, long)]
        requirements: Option<String>,

        /// Object key of an input zip archive already in the bucket
        #[arg(short, long)]
        input: Option<String>,
    },
    /// List a user's executions, newest first
    List {
        /// Owner of the executions
        #[arg(short, long)]
        user: String,

        /// Only show executions in this status (running, success, failed)
        #[arg(short, long)]
        status: Option<ExecutionStatus>,
    },
    /// Get execution details and logs
    Get {
        /// Execution ID
        id: Uuid,
    },
    /// Delete an execution record
    Delete {
        /// Execution ID
        id: Uuid,
    },
    /// Resend a final status report
    Resend {
        /// Execution ID
        id: Uuid,

        /// Final status to report (success, failed)
        #[arg(short, long)]
        status: ExecutionStatus,

        /// Path to a file holding the run log
        #[arg(short, long)]
        logs: Option<String>,

        /// Object key of the output archive
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Handle execution commands
pub async fn handle_execution_command(command: ExecutionCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        ExecutionCommands::Submit {
            code,
            user,
            requirements,
            input,
        } => submit_execution(&client, &code, user, requirements, input).await,
        ExecutionCommands::List { user, status } => list_executions(&client, &user, status).await,
        ExecutionCommands::Get { id } => get_execution(&client, id).await,
        ExecutionCommands::Delete { id } => delete_execution(&client, id).await,
        ExecutionCommands::Resend {
            id,
            status,
            logs,
            output,
        } => resend_status(&client, id, status, logs, output).await,
    }
}

/// Submit a script
async fn submit_execution(
    client: &OrchestratorClient,
    code_path: &str,
    user_id: String,
    requirements_path: Option<String>,
    input_file: Option<String>,
) -> Result<()> {
    let code = std::fs::read_to_string(code_path)
        .with_context(|| format!("Failed to read script file: {}", code_path))?;

    let requirements = match requirements_path {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read requirements file: {}", path))?,
        ),
        None => None,
    };

    let req = CreateExecution {
        user_id,
        code,
        requirements,
        input_file,
    };

    match client.submit_execution(&req).await {
        Ok(execution) => {
            println!("{}", "✓ Execution submitted".green().bold());
            println!("  ID:     {}", execution.id.to_string().cyan());
            println!("  Status: {}", colorize_status(execution.status));
            println!();
            println!(
                "{}",
                format!("Check progress with: runbox execution get {}", execution.id).dimmed()
            );
            Ok(())
        }
        Err(ClientError::SchedulingFailed {
            execution_id,
            message,
        }) => {
            println!("{}", "✗ Execution could not be scheduled".red().bold());
            println!("  ID:     {}", execution_id.to_string().cyan());
            println!("  Reason: {}", message.red());
            anyhow::bail!("execution {} failed to schedule", execution_id)
        }
        Err(e) => Err(e.into()),
    }
}

/// List executions
async fn list_executions(
    client: &OrchestratorClient,
    user_id: &str,
    status: Option<ExecutionStatus>,
) -> Result<()> {
    let executions = client.list_executions(user_id, status).await?;

    if executions.is_empty() {
        println!("{}", "No executions found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} execution(s):", executions.len()).bold()
        );
        println!();
        for execution in &executions {
            print_execution_summary(execution);
        }
    }

    Ok(())
}

/// Get and display a single execution
async fn get_execution(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let execution = client.get_execution(id).await?;

    print_execution_details(&execution);

    Ok(())
}

/// Delete an execution
async fn delete_execution(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    client.delete_execution(id).await?;

    println!("{}", format!("✓ Execution {} deleted", id).green());

    Ok(())
}

/// Resend a status report
async fn resend_status(
    client: &OrchestratorClient,
    id: Uuid,
    status: ExecutionStatus,
    logs_path: Option<String>,
    output_file: Option<String>,
) -> Result<()> {
    if !status.is_terminal() {
        anyhow::bail!("status must be SUCCESS or FAILED, got {}", status);
    }

    let logs = match logs_path {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read log file: {}", path))?,
        ),
        None => None,
    };

    let applied = client
        .update_execution(&ExecutionUpdate {
            id,
            status,
            logs,
            output_file,
        })
        .await
        .context("Failed to resend status (is RUNBOX_EXECUTION_TOKEN set?)")?;

    if applied {
        println!(
            "{}",
            format!("✓ Execution {} marked {}", id, status).green()
        );
    } else {
        println!(
            "{}",
            format!("Execution {} was not updated (unknown or already finished)", id).yellow()
        );
    }

    Ok(())
}

/// Print an execution summary
fn print_execution_summary(execution: &Execution) {
    println!("  {} Execution {}", "▸".cyan(), execution.id.to_string().dimmed());
    println!("    Status:   {}", colorize_status(execution.status));
    println!(
        "    Created:  {}",
        execution
            .created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(output) = &execution.output_file {
        println!("    Output:   {}", output.dimmed());
    }
    println!();
}

/// Print detailed execution information
fn print_execution_details(execution: &Execution) {
    println!("{}", "Execution Details:".bold());
    println!("  ID:         {}", execution.id.to_string().cyan());
    println!("  User:       {}", execution.user_id);
    println!("  Status:     {}", colorize_status(execution.status));
    println!(
        "  Created:    {}",
        execution.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(completed) = execution.completed_at {
        println!("  Completed:  {}", completed.format("%Y-%m-%d %H:%M:%S"));

        let duration = completed.signed_duration_since(execution.created_at);
        println!("  Duration:   {}s", duration.num_seconds());
    }

    if let Some(input) = &execution.input_file {
        println!("  Input:      {}", input);
    }
    if let Some(output) = &execution.output_file {
        println!("  Output:     {}", output.green());
    }

    println!("\n{}", "Code:".bold());
    println!("{}", "─".repeat(80).dimmed());
    println!("{}", execution.code);
    println!("{}", "─".repeat(80).dimmed());

    if let Some(requirements) = &execution.requirements {
        println!("\n{}", "Requirements:".bold());
        println!("{}", requirements.trim_end());
    }

    match &execution.logs {
        Some(logs) if !logs.is_empty() => {
            println!("\n{}", "Logs:".bold());
            println!("{}", "─".repeat(80).dimmed());
            for line in logs.lines() {
                print_log_line(line);
            }
            println!("{}", "─".repeat(80).dimmed());
        }
        _ => println!("\n{}", "No logs yet.".dimmed()),
    }
}

/// Print one `[section] message` log line, colored by section
fn print_log_line(line: &str) {
    let Some(rest) = line.strip_prefix('[') else {
        println!("{}", line);
        return;
    };
    let Some((section, message)) = rest.split_once("] ") else {
        println!("{}", line);
        return;
    };

    let tag = format!("[{}]", section);
    let tag = if section.ends_with("stderr") {
        tag.red()
    } else if section == "runner" {
        tag.cyan()
    } else {
        tag.dimmed()
    };
    println!("{} {}", tag, message);
}

/// Colorize execution status for display
fn colorize_status(status: ExecutionStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        ExecutionStatus::Running => status_str.cyan(),
        ExecutionStatus::Success => status_str.green(),
        ExecutionStatus::Failed => status_str.red(),
    }
}
