//! # devstack
//!
//! Command-line entry point that brings the local development stack up and
//! down: the database container, the orchestrator and the runner.

#[cfg(not(unix))]
compile_error!("devstack supervises processes with POSIX signals and only builds on Unix");

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "devstack")]
#[command(about = "Start, stop and inspect the local development stack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Configuration file, relative to the project root (default: devstack.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the database, build, then launch the orchestrator and runner
    Start {
        /// Skip the build step
        #[arg(long)]
        skip_build: bool,
    },
    /// Stop the runner, the orchestrator and the database
    Stop,
    /// Stop everything, wait briefly, then start again
    Restart {
        /// Skip the build step
        #[arg(long)]
        skip_build: bool,
    },
    /// Follow the service log files
    Logs,
    /// Stop everything and remove the database container with its data
    Clean,
    /// Show the database state and every recorded service
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Progress goes to stderr so `status --json` stays machine readable.
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DEVSTACK_LOG").unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let config = commands::load(&root, cli.config.as_deref()).await?;

    match cli.command {
        Commands::Start { skip_build } => commands::start(config, skip_build).await,
        Commands::Stop => commands::stop(config).await,
        Commands::Restart { skip_build } => commands::restart(config, skip_build).await,
        Commands::Logs => commands::logs(&config).await,
        Commands::Clean => commands::clean(config).await,
        Commands::Status { json } => commands::status(config, json).await,
    }
}
