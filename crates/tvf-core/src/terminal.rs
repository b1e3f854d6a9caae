//! The terminal entity
//!
//! A [`Terminal`] is a deployed set-top box. Its liveness pair
//! (`online`, `lastSeen`) lives in a [`Liveness`] value that can only be
//! changed through a narrow API: anything may mark a terminal as seen, but
//! the online flag is cleared only by [`Terminal::demote_if_stale`], and
//! only when the last sighting is older than the given threshold.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::types::{LocationBinding, LocationType, MacAddress, TerminalId};

/// Liveness state of a terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liveness {
    online: bool,
    last_seen: Option<DateTime<Utc>>,
}

impl Liveness {
    fn offline() -> Self {
        Self {
            online: false,
            last_seen: None,
        }
    }

    /// Whether the terminal is currently considered online
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Last time the terminal was seen alive
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Whether the last sighting is older than `threshold`.
    ///
    /// A terminal that was never seen is not stale.
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        matches!(self.last_seen, Some(seen) if seen < threshold)
    }
}

/// A deployed IPTV terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terminal {
    pub id: TerminalId,
    pub terminal_code: String,
    pub ip_address: IpAddr,
    pub mac_address: MacAddress,
    pub device_type: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub app_version: Option<String>,
    pub platform: Option<String>,
    #[serde(flatten)]
    pub location: Option<LocationBinding>,
    #[serde(flatten)]
    liveness: Liveness,
    /// Advisory uptime percentage
    pub uptime: Option<f64>,
    /// Administrative enable flag, independent of liveness
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Terminal {
    /// Build a new, offline terminal from a registration request
    pub fn from_spec(spec: TerminalSpec, now: DateTime<Utc>) -> Result<Self, RegistryError> {
        let location = LocationBinding::from_parts(
            spec.location_type,
            spec.location_identifier.as_deref(),
        )?;

        Ok(Self {
            id: TerminalId::new(),
            terminal_code: validate_code(&spec.terminal_code)?,
            ip_address: parse_ip(&spec.ip_address)?,
            mac_address: MacAddress::parse(&spec.mac_address)?,
            device_type: spec.device_type,
            brand: spec.brand,
            model: spec.model,
            firmware_version: spec.firmware_version,
            app_version: spec.app_version,
            platform: spec.platform,
            location,
            liveness: Liveness::offline(),
            uptime: validate_uptime(spec.uptime)?,
            active: spec.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
    }

    /// Produce the updated terminal a patch describes, leaving `self` as is.
    ///
    /// Liveness is carried over unchanged.
    pub fn patched(&self, patch: &TerminalPatch, now: DateTime<Utc>) -> Result<Self, RegistryError> {
        let mut next = self.clone();

        if let Some(code) = &patch.terminal_code {
            next.terminal_code = validate_code(code)?;
        }
        if let Some(ip) = &patch.ip_address {
            next.ip_address = parse_ip(ip)?;
        }
        if let Some(mac) = &patch.mac_address {
            next.mac_address = MacAddress::parse(mac)?;
        }
        if let Some(location) = LocationBinding::from_parts(
            patch.location_type,
            patch.location_identifier.as_deref(),
        )? {
            next.location = Some(location);
        }
        if patch.uptime.is_some() {
            next.uptime = validate_uptime(patch.uptime)?;
        }
        if let Some(active) = patch.active {
            next.active = active;
        }

        merge(&mut next.device_type, &patch.device_type);
        merge(&mut next.brand, &patch.brand);
        merge(&mut next.model, &patch.model);
        merge(&mut next.firmware_version, &patch.firmware_version);
        merge(&mut next.app_version, &patch.app_version);
        merge(&mut next.platform, &patch.platform);

        next.updated_at = now;
        Ok(next)
    }

    /// Liveness state
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Shorthand for `liveness().is_online()`
    pub fn is_online(&self) -> bool {
        self.liveness.online
    }

    /// Shorthand for `liveness().last_seen()`
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.liveness.last_seen
    }

    /// Record a sign of life (heartbeat or successful probe)
    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.liveness.online = true;
        self.liveness.last_seen = Some(at);
    }

    /// Move `lastSeen` forward without touching the online flag
    pub fn refresh_last_seen(&mut self, at: DateTime<Utc>) {
        self.liveness.last_seen = Some(at);
    }

    /// Clear the online flag if the terminal is online and stale.
    ///
    /// Returns `true` if the terminal went offline.
    pub fn demote_if_stale(&mut self, threshold: DateTime<Utc>) -> bool {
        if self.liveness.online && self.liveness.is_stale(threshold) {
            self.liveness.online = false;
            true
        } else {
            false
        }
    }

    /// Replace the location binding
    pub fn bind_location(&mut self, location: Option<LocationBinding>, now: DateTime<Utc>) {
        self.location = location;
        self.updated_at = now;
    }

    /// Location type, if bound
    pub fn location_type(&self) -> Option<LocationType> {
        self.location.as_ref().map(|l| l.location_type)
    }
}

fn merge(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

fn validate_code(code: &str) -> Result<String, RegistryError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(RegistryError::Invalid(
            "terminalCode must not be empty".to_string(),
        ));
    }
    Ok(code.to_string())
}

fn parse_ip(ip: &str) -> Result<IpAddr, RegistryError> {
    ip.trim()
        .parse()
        .map_err(|_| RegistryError::Invalid(format!("invalid ipAddress {:?}", ip)))
}

fn validate_uptime(uptime: Option<f64>) -> Result<Option<f64>, RegistryError> {
    match uptime {
        Some(u) if !(0.0..=100.0).contains(&u) => Err(RegistryError::Invalid(format!(
            "uptime must be a percentage, got {}",
            u
        ))),
        other => Ok(other),
    }
}

/// Registration request for a new terminal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSpec {
    pub terminal_code: String,
    pub ip_address: String,
    pub mac_address: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub location_type: Option<LocationType>,
    #[serde(default)]
    pub location_identifier: Option<String>,
    #[serde(default)]
    pub uptime: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Partial update of an existing terminal. Absent fields are left as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalPatch {
    pub terminal_code: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub device_type: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub app_version: Option<String>,
    pub platform: Option<String>,
    pub location_type: Option<LocationType>,
    pub location_identifier: Option<String>,
    pub uptime: Option<f64>,
    pub active: Option<bool>,
}

impl TerminalPatch {
    /// The location binding this patch requests, if any
    pub fn location(&self) -> Result<Option<LocationBinding>, RegistryError> {
        LocationBinding::from_parts(self.location_type, self.location_identifier.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn spec() -> TerminalSpec {
        TerminalSpec {
            terminal_code: "STB-101".to_string(),
            ip_address: "10.0.1.101".to_string(),
            mac_address: "aa:bb:cc:00:01:01".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_terminal_is_offline_and_active() {
        let now = Utc::now();
        let terminal = Terminal::from_spec(spec(), now).unwrap();

        assert!(!terminal.is_online());
        assert_eq!(terminal.last_seen(), None);
        assert!(terminal.active);
        assert_eq!(terminal.mac_address.as_str(), "AA:BB:CC:00:01:01");
        assert_eq!(terminal.created_at, now);
    }

    #[test]
    fn test_spec_validation() {
        let mut bad = spec();
        bad.terminal_code = "  ".to_string();
        assert!(matches!(
            Terminal::from_spec(bad, Utc::now()),
            Err(RegistryError::Invalid(_))
        ));

        let mut bad = spec();
        bad.ip_address = "10.0.1".to_string();
        assert!(Terminal::from_spec(bad, Utc::now()).is_err());

        let mut bad = spec();
        bad.mac_address = "zz".to_string();
        assert!(Terminal::from_spec(bad, Utc::now()).is_err());

        let mut bad = spec();
        bad.uptime = Some(120.0);
        assert!(Terminal::from_spec(bad, Utc::now()).is_err());
    }

    #[test]
    fn test_demote_only_when_stale_and_online() {
        let now = Utc::now();
        let mut terminal = Terminal::from_spec(spec(), now).unwrap();

        // Never seen: nothing to demote
        assert!(!terminal.demote_if_stale(now));

        terminal.mark_seen(now - Duration::minutes(10));
        assert!(terminal.is_online());

        // Seen after the threshold: stays online
        assert!(!terminal.demote_if_stale(now - Duration::minutes(15)));
        assert!(terminal.is_online());

        assert!(terminal.demote_if_stale(now - Duration::minutes(5)));
        assert!(!terminal.is_online());

        // Already offline: no transition
        assert!(!terminal.demote_if_stale(now));
    }

    #[test]
    fn test_refresh_last_seen_keeps_online_flag() {
        let now = Utc::now();
        let mut terminal = Terminal::from_spec(spec(), now).unwrap();

        terminal.refresh_last_seen(now);
        assert!(!terminal.is_online());
        assert_eq!(terminal.last_seen(), Some(now));
    }

    #[test]
    fn test_patch_keeps_liveness_and_replaces_location() {
        let now = Utc::now();
        let mut terminal = Terminal::from_spec(
            TerminalSpec {
                location_type: Some(LocationType::Room),
                location_identifier: Some("101".to_string()),
                ..spec()
            },
            now,
        )
        .unwrap();
        terminal.mark_seen(now);

        let patch = TerminalPatch {
            ip_address: Some("10.0.1.102".to_string()),
            location_type: Some(LocationType::Lobby),
            location_identifier: Some("main".to_string()),
            brand: Some("Amino".to_string()),
            ..Default::default()
        };
        let next = terminal.patched(&patch, now).unwrap();

        assert!(next.is_online());
        assert_eq!(next.last_seen(), Some(now));
        assert_eq!(next.ip_address.to_string(), "10.0.1.102");
        assert_eq!(next.brand.as_deref(), Some("Amino"));
        assert_eq!(
            next.location,
            Some(LocationBinding::new(LocationType::Lobby, "main").unwrap())
        );
        assert_eq!(next.terminal_code, terminal.terminal_code);
    }

    #[test]
    fn test_serialized_shape() {
        let now = Utc::now();
        let mut terminal = Terminal::from_spec(
            TerminalSpec {
                location_type: Some(LocationType::Room),
                location_identifier: Some("101".to_string()),
                ..spec()
            },
            now,
        )
        .unwrap();
        terminal.mark_seen(now);

        let json = serde_json::to_value(&terminal).unwrap();
        assert_eq!(json["terminalCode"], "STB-101");
        assert_eq!(json["macAddress"], "AA:BB:CC:00:01:01");
        assert_eq!(json["ipAddress"], "10.0.1.101");
        assert_eq!(json["locationType"], "ROOM");
        assert_eq!(json["locationIdentifier"], "101");
        assert_eq!(json["online"], true);
        assert!(json["lastSeen"].is_string());

        let back: Terminal = serde_json::from_value(json).unwrap();
        assert_eq!(back, terminal);
    }
}
