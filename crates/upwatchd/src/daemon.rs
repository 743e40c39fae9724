//! `upwatchd run`: open storage, start the monitor, serve the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::{error, info, warn};

use upwatch_core::UpwatchConfig;
use upwatch_probe::NetworkProber;
use upwatch_scheduler::Monitor;
use upwatch_state::StateStore;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to upwatch.toml. Defaults apply when omitted.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Data directory for persistent state.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Number of probe workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Bearer token required by mutating API routes.
    #[arg(long, env = "UPWATCH_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,
}

/// Load the config file (if any) and apply command-line overrides.
pub fn load_config(args: &RunArgs) -> anyhow::Result<UpwatchConfig> {
    let mut config = match &args.config {
        Some(path) => UpwatchConfig::from_file(path)?,
        None => UpwatchConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(workers) = args.workers {
        anyhow::ensure!(workers > 0, "--workers must be at least 1");
        config.scheduler.workers = workers;
    }
    if let Some(token) = &args.admin_token {
        config.server.admin_token = Some(token.clone());
    }
    Ok(config)
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    info!(config = ?args.config, "upwatch daemon starting");

    // ── Storage ────────────────────────────────────────────────

    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.storage.data_dir.join("upwatch.redb");
    let store = Arc::new(StateStore::open(&db_path)?);
    info!(path = ?db_path, "state store opened");

    // ── Monitor ────────────────────────────────────────────────

    let prober = Arc::new(NetworkProber::new()?);
    let monitor = Arc::new(Monitor::new(store, prober, &config.scheduler));
    monitor.restore().await?;
    monitor.seed(&config.services).await?;

    if config.server.admin_token.is_none() {
        warn!("no admin token configured, mutating API routes are disabled");
    }

    // ── API server ─────────────────────────────────────────────

    let router = upwatch_api::build_router(monitor.clone(), config.server.admin_token.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            info!("shutdown signal received");
        })
        .await?;

    monitor.shutdown().await;
    info!("upwatch daemon stopped");
    Ok(())
}
