//! Worldview CLI — the main entry point.
//!
//! Commands:
//! - `ingest`  — Run one ingestion cycle over a JSON batch
//! - `beliefs` — List belief axes (and drift alerts)
//! - `apply`   — Apply external axis deltas or a merge decision
//! - `scan`    — Run the redundancy detector over all axes
//! - `status`  — Show store and configuration status

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "worldview",
    about = "Worldview — text-stream signal extraction and belief tracking",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (default: ~/.worldview/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion cycle over a JSON item batch
    Ingest {
        /// Batch file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List belief axes with score, confidence, and evidence counts
    Beliefs {
        /// Also list recorded drift alerts
        #[arg(long)]
        alerts: bool,
    },

    /// Apply a JSON array of axis deltas, or merge two axes
    Apply {
        /// Delta file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Merge two axes by id instead of applying deltas
        #[arg(long, num_args = 2, value_names = ["AXIS_A", "AXIS_B"])]
        merge: Option<Vec<String>>,
    },

    /// Scan all axes for semantically redundant pairs
    Scan,

    /// Show item/axis/alert counts and configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { file } => commands::ingest::run(&config, file).await?,
        Commands::Beliefs { alerts } => commands::beliefs::run(&config, alerts).await?,
        Commands::Apply { file, merge } => commands::apply::run(&config, file, merge).await?,
        Commands::Scan => commands::scan::run(&config).await?,
        Commands::Status => commands::status::run(&config).await?,
    }

    Ok(())
}
