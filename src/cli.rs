// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{ArgGroup, Parser, Subcommand};
use skiff::deploy::DEFAULT_BRANCH;
use skiff::logs::DEFAULT_LINES;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Deploy a project to a server over SSH with backup, restart and verification")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the current repository to an environment
    Deploy {
        /// Target environment (development, staging, production)
        #[arg(short, long)]
        env: String,

        /// Branch to deploy
        #[arg(short, long, default_value = DEFAULT_BRANCH)]
        branch: String,

        /// Skip confirmation prompts
        #[arg(short, long)]
        force: bool,

        /// Walk the pipeline without touching the server
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage server profiles
    #[command(group(
        ArgGroup::new("action")
            .required(true)
            .args(["init", "add_server", "list", "remove"])
    ))]
    Config {
        /// Write a commented template profile store
        #[arg(long)]
        init: bool,

        /// Overwrite an existing store with --init, or an existing server with --add-server
        #[arg(long)]
        force: bool,

        /// Add a server profile interactively
        #[arg(long, value_name = "NAME")]
        add_server: Option<String>,

        /// List configured servers
        #[arg(long)]
        list: bool,

        /// Remove a server profile
        #[arg(long, value_name = "NAME")]
        remove: Option<String>,
    },

    /// Show the state of an environment's server
    Status {
        #[arg(short, long)]
        env: String,
    },

    /// Show the remote application log
    Logs {
        #[arg(short, long)]
        env: String,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_LINES)]
        lines: usize,

        /// Keep streaming new lines until interrupted
        #[arg(short, long)]
        follow: bool,
    },

    /// Choose environment and branch interactively, then deploy
    Quick,
}
