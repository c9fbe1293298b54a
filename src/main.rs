// ABOUTME: Entry point for the skiff CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use skiff::deploy::DeploymentRequest;
use skiff::error::{Error, Result};
use skiff::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli.command, Output::new(mode)).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    match command {
        Commands::Deploy {
            env,
            branch,
            force,
            dry_run,
        } => {
            let request = DeploymentRequest::new(env)
                .branch(branch)
                .force(force)
                .dry_run(dry_run);
            commands::deploy(request, output).await
        }
        Commands::Config {
            init,
            force,
            add_server,
            list,
            remove,
        } => {
            if init {
                commands::config_init(force, &output)
            } else if let Some(name) = add_server {
                commands::config_add_server(&name, force, &output)
            } else if list {
                commands::config_list(&output)
            } else if let Some(name) = remove {
                commands::config_remove(&name, &output)
            } else {
                Err(Error::InvalidInput("no config action given".to_string()))
            }
        }
        Commands::Status { env } => commands::status(&env, &output).await,
        Commands::Logs { env, lines, follow } => {
            commands::logs(&env, lines, follow, &output).await
        }
        Commands::Quick => commands::quick(output).await,
    }
}
