//! tvfleet terminal agent
//!
//! Runs on a set-top box and posts heartbeats to the fleet server so the
//! terminal stays marked online.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tvf_agent::{run_heartbeat_loop, ExponentialBackoff, HeartbeatClient};
use tvf_core::config::{self, AgentConfig};

#[derive(Parser)]
#[command(name = "tvf-agent")]
#[command(about = "tvfleet terminal agent - reports liveness to the fleet server")]
#[command(version)]
struct Args {
    /// Fleet server base URL (e.g. http://tvfleet.local:8080)
    #[arg(short, long, env = "TVF_SERVER")]
    server: Option<String>,

    /// MAC address to report
    #[arg(short, long, env = "TVF_MAC")]
    mac: Option<String>,

    /// Seconds between heartbeats
    #[arg(short, long)]
    interval: Option<u64>,

    /// Send a single heartbeat and exit
    #[arg(long)]
    once: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

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
    let log_level = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tvfleet agent starting...");

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_agent_config_path);

    let mut config: AgentConfig = config::load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Apply command-line overrides
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(mac) = args.mac {
        config.mac_address = Some(mac);
    }
    if let Some(secs) = args.interval {
        config.interval = Duration::from_secs(secs);
    }
    config.validate().context("Invalid agent configuration")?;

    let mac = config
        .mac_address
        .as_deref()
        .context("No MAC address configured. Use --mac or set mac_address in the config file.")?;

    let client = HeartbeatClient::new(&config.server_url, mac, config.request_timeout)
        .context("Failed to create heartbeat client")?;

    if args.once {
        client.send().await.context("Heartbeat failed")?;
        tracing::info!("Heartbeat sent for {}", client.mac_address());
        return Ok(());
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        cancel_clone.cancel();
    });

    let backoff = ExponentialBackoff::from_config(&config.backoff);
    run_heartbeat_loop(client, config.interval, backoff, cancel).await;

    tracing::info!("Agent shutdown complete");
    Ok(())
}
