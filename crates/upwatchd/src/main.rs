//! upwatchd: the upwatch daemon.
//!
//! Single binary that assembles the monitor:
//! - State store (redb)
//! - Network prober (HTTP, TCP, ping-like)
//! - Scheduler + worker pool
//! - REST API
//!
//! # Usage
//!
//! ```text
//! upwatchd init-config --output upwatch.toml
//! upwatchd run --config upwatch.toml --port 8080
//! ```

mod daemon;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use upwatch_core::UpwatchConfig;

use crate::daemon::RunArgs;

const DEFAULT_LOG_FILTER: &str = "info,upwatchd=debug,upwatch=debug";

#[derive(Parser)]
#[command(name = "upwatchd", about = "upwatch uptime monitor daemon", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor and serve the API.
    Run(RunArgs),

    /// Write a starter upwatch.toml.
    InitConfig {
        /// Where to write the config.
        #[arg(long, default_value = "upwatch.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run(args) => daemon::run(args).await,
        Command::InitConfig { output, force } => init_config(&output, force),
    }
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    std::fs::write(output, UpwatchConfig::scaffold().to_toml_string()?)?;
    info!(path = %output.display(), "wrote starter config");
    Ok(())
}
