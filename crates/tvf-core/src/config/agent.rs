//! Terminal agent configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Configuration for the heartbeat agent running on a terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the fleet server, e.g. `http://tvfleet.local:8080`
    pub server_url: String,

    /// MAC address to report (the terminal's identity on the server)
    pub mac_address: Option<String>,

    /// Time between heartbeats
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Per-request timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Retry backoff after failed deliveries
    pub backoff: BackoffConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            mac_address: None,
            interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url must not be empty".to_string()));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "interval must be at least one second".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be at least one second".to_string(),
            ));
        }
        self.backoff.validate()
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl BackoffConfig {
    /// Reject delays and factors the backoff cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial.is_zero() || self.max < self.initial {
            return Err(ConfigError::Invalid(
                "backoff requires 0 < initial <= max".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff.multiplier must be a finite number >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(
                "backoff.jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_toml() {
        let config: AgentConfig = toml::from_str(
            r#"
            server_url = "http://10.0.0.2:8080"
            mac_address = "AA:BB:CC:DD:EE:FF"
            interval = 15

            [backoff]
            max = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url, "http://10.0.0.2:8080");
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.backoff.max, Duration::from_secs(120));
        assert_eq!(config.backoff.initial, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(AgentConfig::default().validate().is_ok());

        let config: AgentConfig = toml::from_str("interval = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: AgentConfig = toml::from_str("[backoff]\njitter = nan").unwrap();
        assert!(config.backoff.jitter.is_nan());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: AgentConfig = toml::from_str("[backoff]\nmultiplier = 0.5").unwrap();
        assert!(config.validate().is_err());

        let config: AgentConfig = toml::from_str("[backoff]\ninitial = 30\nmax = 5").unwrap();
        assert!(config.validate().is_err());
    }
}
