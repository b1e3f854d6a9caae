//! Fleet orchestrator
//!
//! [`FleetService`] is the façade the HTTP API talks to. It wires the
//! registry, heartbeat receiver, location manager and probe engine
//! together, and dispatches background jobs (post-registration probes,
//! simulated reboots) on a task tracker so shutdown can wait for them.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::task::TaskTracker;

use tvf_core::api::{FleetStats, RebootAck, TerminalFilter};
use tvf_core::config::ServerConfig;
use tvf_core::error::{FleetError, RegistryError};
use tvf_core::time::now;
use tvf_core::{
    LocationType, RoomDirectory, Terminal, TerminalId, TerminalPatch, TerminalSpec, TerminalStore,
};
use tvf_probe::{ConnectivityTestResult, ProbeEngine};

use crate::heartbeat::{HeartbeatOutcome, HeartbeatReceiver};
use crate::location::LocationManager;
use crate::registry::TerminalRegistry;
use crate::rooms::StaticRoomDirectory;

/// How often [`FleetService::wait_idle`] checks for running jobs
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Entry point for every fleet operation
pub struct FleetService {
    registry: Arc<TerminalRegistry>,
    heartbeats: HeartbeatReceiver,
    locations: LocationManager,
    probe: ProbeEngine,
    tasks: TaskTracker,
    reboot_delay: Duration,
}

impl FleetService {
    /// Create a service from its collaborators
    pub fn new(
        registry: Arc<TerminalRegistry>,
        rooms: Arc<dyn RoomDirectory>,
        probe: ProbeEngine,
        reboot_delay: Duration,
    ) -> Self {
        Self {
            heartbeats: HeartbeatReceiver::new(Arc::clone(&registry)),
            locations: LocationManager::new(Arc::clone(&registry), rooms),
            registry,
            probe,
            tasks: TaskTracker::new(),
            reboot_delay,
        }
    }

    /// Create a service over `store` using the server configuration
    pub fn from_config(config: &ServerConfig, store: Arc<dyn TerminalStore>) -> Self {
        Self::new(
            Arc::new(TerminalRegistry::new(store)),
            Arc::new(StaticRoomDirectory::new(&config.rooms)),
            ProbeEngine::new(config.probe.clone()),
            config.reboot_delay,
        )
    }

    /// The underlying registry (shared with the sweeper)
    pub fn registry(&self) -> &Arc<TerminalRegistry> {
        &self.registry
    }

    /// Register a new terminal and probe it in the background
    pub async fn register_terminal(&self, spec: TerminalSpec) -> Result<Terminal, FleetError> {
        let terminal = Terminal::from_spec(spec, now())?;
        if let Some(location) = &terminal.location {
            self.locations.resolve(location).await?;
        }

        let terminal = self.registry.insert(terminal).await?;
        self.persist().await;
        self.dispatch_probe(terminal.id, terminal.ip_address);
        Ok(terminal)
    }

    /// Apply an administrative update; a new IP address is probed in the
    /// background
    pub async fn update_terminal(
        &self,
        id: &TerminalId,
        patch: TerminalPatch,
    ) -> Result<Terminal, FleetError> {
        self.registry.get(id).await?;
        if let Some(location) = patch.location()? {
            self.locations.resolve(&location).await?;
        }

        let outcome = self.registry.update(id, &patch, now()).await?;
        self.persist().await;
        if outcome.ip_changed {
            self.dispatch_probe(outcome.terminal.id, outcome.terminal.ip_address);
        }
        Ok(outcome.terminal)
    }

    pub async fn get_terminal(&self, id: &TerminalId) -> Result<Terminal, FleetError> {
        Ok(self.registry.get(id).await?)
    }

    /// Terminals matching `filter`, ordered by terminal code
    pub async fn list_terminals(&self, filter: &TerminalFilter) -> Result<Vec<Terminal>, FleetError> {
        let terminals = self.registry.list().await?;
        Ok(terminals.into_iter().filter(|t| filter.matches(t)).collect())
    }

    pub async fn delete_terminal(&self, id: &TerminalId) -> Result<Terminal, FleetError> {
        let removed = self.registry.delete(id).await?;
        self.persist().await;
        Ok(removed)
    }

    /// Enable or disable a terminal; liveness is unaffected
    pub async fn set_active(&self, id: &TerminalId, active: bool) -> Result<Terminal, FleetError> {
        let terminal = self.registry.set_active(id, active, now()).await?;
        tracing::info!(
            "Terminal {} {}",
            terminal.terminal_code,
            if active { "enabled" } else { "disabled" }
        );
        self.persist().await;
        Ok(terminal)
    }

    /// Probe a terminal now. A reachable terminal is marked seen; an
    /// unreachable one is left for the sweeper.
    pub async fn test_connectivity(
        &self,
        id: &TerminalId,
    ) -> Result<ConnectivityTestResult, FleetError> {
        let terminal = self.registry.get(id).await?;
        let result = self.probe.ping(terminal.ip_address).await;

        if result.success {
            self.registry
                .record_probe_success(id, terminal.ip_address, result.timestamp)
                .await?;
        } else {
            tracing::debug!(
                "Connectivity test of {} failed: {}",
                terminal.terminal_code,
                result.message
            );
        }
        Ok(result)
    }

    /// Check the terminal's service ports. Informational only.
    pub async fn test_services(
        &self,
        id: &TerminalId,
    ) -> Result<ConnectivityTestResult, FleetError> {
        let terminal = self.registry.get(id).await?;
        Ok(self.probe.test_services(terminal.ip_address).await)
    }

    /// Apply a heartbeat received now
    pub async fn heartbeat(&self, mac_address: &str) -> Result<HeartbeatOutcome, FleetError> {
        Ok(self.heartbeats.on_heartbeat(mac_address, now()).await?)
    }

    pub async fn assign_location(
        &self,
        id: &TerminalId,
        location_type: LocationType,
        identifier: &str,
    ) -> Result<Terminal, FleetError> {
        let terminal = self.locations.assign(id, location_type, identifier).await?;
        self.persist().await;
        Ok(terminal)
    }

    pub async fn clear_location(&self, id: &TerminalId) -> Result<Terminal, FleetError> {
        let terminal = self.locations.clear(id).await?;
        self.persist().await;
        Ok(terminal)
    }

    /// Terminals last seen before `threshold`; never-seen terminals are
    /// not included
    pub async fn list_inactive_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Terminal>, FleetError> {
        Ok(self.registry.list_inactive_since(threshold).await?)
    }

    /// Acknowledge a reboot request.
    ///
    /// Nothing is sent to the device. After the reboot delay a background
    /// job refreshes `lastSeen`, as if the terminal had come back.
    pub async fn reboot(&self, id: &TerminalId) -> Result<RebootAck, FleetError> {
        let terminal = self.registry.get(id).await?;
        let requested_at = now();

        let registry = Arc::clone(&self.registry);
        let delay = self.reboot_delay;
        let id = *id;
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            match registry.refresh_last_seen(&id, now()).await {
                Ok(t) => tracing::info!("Terminal {} back from reboot", t.terminal_code),
                Err(RegistryError::TerminalNotFound(_)) => {
                    tracing::debug!("Terminal {} deleted during reboot", id);
                }
                Err(e) => tracing::warn!("Failed to record reboot of {}: {}", id, e),
            }
        });

        tracing::info!("Reboot requested for terminal {}", terminal.terminal_code);
        Ok(RebootAck {
            terminal_id: terminal.id,
            requested_at,
            message: format!("Reboot of {} scheduled", terminal.terminal_code),
        })
    }

    /// Fleet-wide counters
    pub async fn stats(&self) -> Result<FleetStats, FleetError> {
        let terminals = self.registry.list().await?;
        Ok(FleetStats::from_terminals(&terminals))
    }

    /// Wait until no background job is running.
    ///
    /// The tracker is left open, so this may run alongside [`shutdown`](Self::shutdown).
    pub async fn wait_idle(&self) {
        while !self.tasks.is_empty() {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Stop accepting background jobs and wait (bounded) for running ones.
    ///
    /// Returns `false` if jobs were still running at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();
        if pending > 0 {
            tracing::info!("Waiting for {} background jobs", pending);
        }
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }

    fn dispatch_probe(&self, id: TerminalId, ip: IpAddr) {
        let registry = Arc::clone(&self.registry);
        let probe = self.probe.clone();

        self.tasks.spawn(async move {
            let result = probe.ping(ip).await;
            if !result.success {
                tracing::debug!("Probe of {} ({}) failed: {}", id, ip, result.message);
                return;
            }

            match registry.record_probe_success(&id, ip, result.timestamp).await {
                Ok(true) => tracing::info!("Terminal {} is online (probe via {})", id, result.method),
                Ok(false) => tracing::debug!("Discarding stale probe result for {} ({})", id, ip),
                Err(e) => tracing::warn!("Failed to record probe of {}: {}", id, e),
            }
        });
    }

    async fn persist(&self) {
        if let Err(e) = self.registry.flush().await {
            tracing::warn!("Failed to flush registry: {}", e);
        }
    }
}
