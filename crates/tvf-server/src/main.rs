//! tvfleet server daemon
//!
//! Serves the terminal fleet HTTP API and runs the liveness sweeper.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tvf_core::config::{self, ServerConfig};
use tvf_core::TerminalStore;
use tvf_server::sweeper::{run_liveness_sweeper, SweeperSettings};
use tvf_server::{api, FleetService, MemoryStore};

/// Upper bound on waiting for probe and reboot jobs at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "tvf-server")]
#[command(about = "tvfleet terminal fleet server")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Registry snapshot file (overrides config)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tvfleet server starting...");

    let mut config = load_config(args.config.as_ref())?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(data_file) = args.data_file {
        config.data_file = Some(data_file);
    }
    config.validate().context("Invalid server configuration")?;

    let store: Arc<dyn TerminalStore> = match &config.data_file {
        Some(path) => Arc::new(
            MemoryStore::open(path)
                .await
                .with_context(|| format!("Failed to load registry snapshot {:?}", path))?,
        ),
        None => {
            tracing::warn!("No data_file configured - terminals will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let fleet = Arc::new(FleetService::from_config(&config, store));
    tracing::info!("{} rooms known", config.rooms.len());

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let sweeper = tokio::spawn(run_liveness_sweeper(
        Arc::clone(fleet.registry()),
        SweeperSettings::from(&config),
        cancel.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("Listening on {}", config.bind_address);

    let shutdown = cancel.clone();
    axum::serve(listener, api::router(Arc::clone(&fleet)))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Sweeper task ended abnormally: {}", e);
    }
    if !fleet.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!("Background jobs still running after {:?}", SHUTDOWN_GRACE);
    }
    fleet
        .registry()
        .flush()
        .await
        .context("Failed to write final registry snapshot")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<ServerConfig> {
    if let Some(config_path) = path {
        return config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    let default_path = config::default_server_config_path();
    Ok(config::load_config_or_default(&default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        ServerConfig::default()
    }))
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });
}
