//! HTTP API payloads
//!
//! JSON bodies exchanged between the admin dashboard / terminals and the
//! server. Field names are camelCase on the wire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::terminal::Terminal;
use crate::types::{LocationType, TerminalId};

/// Heartbeat sent by a terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub mac_address: String,
}

/// Location assignment request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    pub location_type: LocationType,
    pub location_identifier: String,
}

/// Administrative enable/disable request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

/// Query for terminals that have not been seen recently.
///
/// `since` takes precedence over `minutes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InactiveQuery {
    pub since: Option<DateTime<Utc>>,
    pub minutes: Option<u64>,
}

/// List filter; absent fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalFilter {
    pub online: Option<bool>,
    pub active: Option<bool>,
    pub location_type: Option<LocationType>,
}

impl TerminalFilter {
    /// Whether a terminal passes this filter
    pub fn matches(&self, terminal: &Terminal) -> bool {
        self.online.map_or(true, |o| terminal.is_online() == o)
            && self.active.map_or(true, |a| terminal.active == a)
            && self
                .location_type
                .map_or(true, |t| terminal.location_type() == Some(t))
    }
}

/// Fleet-wide counters for the operator dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub active: usize,
    pub inactive: usize,
    /// Terminal count per location type; unbound terminals under `UNASSIGNED`
    pub by_location: BTreeMap<String, usize>,
}

impl FleetStats {
    /// Tally a set of terminals
    pub fn from_terminals<'a>(terminals: impl IntoIterator<Item = &'a Terminal>) -> Self {
        let mut stats = FleetStats::default();
        for terminal in terminals {
            stats.total += 1;
            if terminal.is_online() {
                stats.online += 1;
            } else {
                stats.offline += 1;
            }
            if terminal.active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            let key = terminal
                .location_type()
                .map_or_else(|| "UNASSIGNED".to_string(), |t| t.to_string());
            *stats.by_location.entry(key).or_default() += 1;
        }
        stats
    }
}

/// Acknowledgement of a simulated reboot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebootAck {
    pub terminal_id: TerminalId,
    pub requested_at: DateTime<Utc>,
    pub message: String,
}

/// Error body returned with every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
