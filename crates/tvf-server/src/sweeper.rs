//! Liveness sweeper
//!
//! Background task that periodically demotes terminals that have not been
//! seen within the stale window. It is the only path that sets a
//! terminal offline.
//!
//! Each pass:
//! 1. computes `threshold = now - stale_window`
//! 2. selects terminals last seen before the threshold
//! 3. demotes the ones still marked online, logging each transition
//!
//! A store failure on one terminal is logged and skipped; the next pass
//! retries it. Passes never overlap.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use tvf_core::config::ServerConfig;
use tvf_core::error::RegistryError;
use tvf_core::time::stale_threshold;
use tvf_core::{MacAddress, TerminalId};

use crate::registry::TerminalRegistry;

/// Sweeper timing
#[derive(Debug, Clone, Copy)]
pub struct SweeperSettings {
    /// Time between passes
    pub interval: Duration,
    /// How long a terminal may stay quiet before it is demoted
    pub stale_window: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_window: Duration::from_secs(300),
        }
    }
}

impl From<&ServerConfig> for SweeperSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.sweep_interval,
            stale_window: config.stale_window,
        }
    }
}

/// A terminal going from online to offline
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessTransition {
    pub terminal_id: TerminalId,
    pub terminal_code: String,
    pub mac_address: MacAddress,
    pub last_seen: Option<DateTime<Utc>>,
    pub demoted_at: DateTime<Utc>,
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Terminals selected as stale
    pub examined: usize,
    /// Terminals demoted during this pass
    pub demoted: Vec<LivenessTransition>,
    /// Terminals skipped because of a store error
    pub failures: usize,
}

/// Run a single sweep pass at `now`
pub async fn sweep_once(
    registry: &TerminalRegistry,
    now: DateTime<Utc>,
    stale_window: Duration,
) -> Result<SweepReport, RegistryError> {
    let threshold = stale_threshold(now, stale_window);
    let candidates = registry.list_inactive_since(threshold).await?;

    let mut report = SweepReport {
        examined: candidates.len(),
        ..Default::default()
    };

    for terminal in candidates.into_iter().filter(|t| t.is_online()) {
        match registry.demote_if_stale(&terminal.id, threshold).await {
            Ok(true) => {
                let last_seen = terminal.last_seen();
                tracing::info!(
                    "Terminal {} ({}) is offline, last seen {:?}",
                    terminal.terminal_code,
                    terminal.mac_address,
                    last_seen
                );
                report.demoted.push(LivenessTransition {
                    terminal_id: terminal.id,
                    terminal_code: terminal.terminal_code,
                    mac_address: terminal.mac_address,
                    last_seen,
                    demoted_at: now,
                });
            }
            // Refreshed or deleted since selection
            Ok(false) | Err(RegistryError::TerminalNotFound(_)) => {}
            Err(e) => {
                tracing::warn!(
                    "Failed to demote terminal {}: {}",
                    terminal.terminal_code,
                    e
                );
                report.failures += 1;
            }
        }
    }

    if let Err(e) = registry.flush().await {
        tracing::warn!("Failed to flush registry after sweep: {}", e);
    }

    Ok(report)
}

/// Run the liveness sweeper until `cancel` fires.
///
/// # Arguments
///
/// * `registry` - The terminal registry to sweep
/// * `settings` - Pass interval and stale window
/// * `cancel` - Cancellation token for graceful shutdown
pub async fn run_liveness_sweeper(
    registry: Arc<TerminalRegistry>,
    settings: SweeperSettings,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Starting liveness sweeper (stale window: {:?}, interval: {:?})",
        settings.stale_window,
        settings.interval
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sweep_once(&registry, tvf_core::time::now(), settings.stale_window).await {
                    Ok(report) if !report.demoted.is_empty() || report.failures > 0 => {
                        tracing::info!(
                            "Sweep demoted {} of {} stale terminals ({} failures)",
                            report.demoted.len(),
                            report.examined,
                            report.failures
                        );
                    }
                    Ok(report) => {
                        tracing::debug!("Sweep found {} stale terminals", report.examined);
                    }
                    Err(e) => {
                        tracing::warn!("Sweep pass failed: {}", e);
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Liveness sweeper shutting down");
                break;
            }
        }
    }
}
