//! Server daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use tvf_probe::ProbeSettings;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Configuration for the fleet server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    pub bind_address: String,

    /// How often the liveness sweeper runs
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,

    /// A terminal not seen for this long is demoted to offline
    #[serde(with = "duration_secs")]
    pub stale_window: Duration,

    /// Delay before a simulated reboot refreshes `lastSeen`
    #[serde(with = "duration_secs")]
    pub reboot_delay: Duration,

    /// Registry snapshot file (in-memory only when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Room numbers known to the hotel
    pub rooms: Vec<String>,

    /// Connectivity probe tuning
    pub probe: ProbeSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            sweep_interval: Duration::from_secs(60),
            stale_window: Duration::from_secs(300),
            reboot_delay: Duration::from_secs(5),
            data_file: None,
            rooms: Vec::new(),
            probe: ProbeSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sweep_interval must be at least one second".to_string(),
            ));
        }
        if self.stale_window.is_zero() {
            return Err(ConfigError::Invalid(
                "stale_window must be at least one second".to_string(),
            ));
        }
        if self.probe.timeout_ms == 0 || self.probe.service_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "probe timeouts must be greater than zero".to_string(),
            ));
        }
        if self.probe.service_ports.is_empty() {
            return Err(ConfigError::Invalid(
                "probe.service_ports must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.stale_window, Duration::from_secs(300));
        assert_eq!(config.reboot_delay, Duration::from_secs(5));
        assert_eq!(config.probe.timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            stale_window = 120
            rooms = ["101", "102"]
            data_file = "/var/lib/tvfleet/terminals.json"

            [probe]
            timeout_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.stale_window, Duration::from_secs(120));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.rooms.len(), 2);
        assert!(config.data_file.is_some());
        assert_eq!(config.probe.timeout_ms, 1000);
        assert_eq!(config.probe.service_timeout_ms, 2000);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = ServerConfig {
            stale_window: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_probe_timeouts() {
        let mut config = ServerConfig::default();
        config.probe.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServerConfig::default();
        config.probe.service_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
