//! Runbox CLI
//!
//! Command-line interface for submitting and inspecting executions.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "runbox")]
#[command(about = "Runbox code execution CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "RUNBOX_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// Callback token, used by `execution resend`
    #[arg(long, env = "RUNBOX_EXECUTION_TOKEN", hide_env_values = true)]
    execution_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
        execution_token: cli.execution_token,
    };

    handle_command(cli.command, &config).await
}
