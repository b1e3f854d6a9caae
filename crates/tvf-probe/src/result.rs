//! Connectivity test results

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which probe produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeMethod {
    /// TCP connect to the primary management port
    TcpConnect,
    /// ICMP-style reachability fallback
    IcmpPing,
    /// Multi-port service reachability test
    ServiceTest,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::TcpConnect => write!(f, "TCP_CONNECT"),
            ProbeMethod::IcmpPing => write!(f, "ICMP_PING"),
            ProbeMethod::ServiceTest => write!(f, "SERVICE_TEST"),
        }
    }
}

/// Failure classification for unsuccessful probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeErrorCode {
    /// Neither TCP nor ICMP reached the host
    HostUnreachable,
    /// The ICMP fallback itself could not run
    PingFailed,
}

impl fmt::Display for ProbeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeErrorCode::HostUnreachable => write!(f, "HOST_UNREACHABLE"),
            ProbeErrorCode::PingFailed => write!(f, "PING_FAILED"),
        }
    }
}

/// Outcome of a single probe invocation. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityTestResult {
    /// Whether the terminal was reached
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// When the probe finished
    pub timestamp: DateTime<Utc>,
    /// Probe that produced this result
    pub method: ProbeMethod,
    /// Failure classification, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ProbeErrorCode>,
    /// Method-specific diagnostics
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl ConnectivityTestResult {
    /// A successful result
    pub fn reachable(method: ProbeMethod, message: impl Into<String>) -> Self {
        Self::new(true, method, message)
    }

    /// An unsuccessful result
    pub fn unreachable(method: ProbeMethod, message: impl Into<String>) -> Self {
        Self::new(false, method, message)
    }

    fn new(success: bool, method: ProbeMethod, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            timestamp: Utc::now(),
            method,
            error_code: None,
            details: BTreeMap::new(),
        }
    }

    /// Attach an error code (mirrored into `details.errorCode`)
    pub fn with_error_code(mut self, code: ProbeErrorCode) -> Self {
        self.error_code = Some(code);
        self.details
            .insert("errorCode".to_string(), Value::String(code.to_string()));
        self
    }

    /// Attach a diagnostic entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Look up a diagnostic entry
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Per-port outcome of a service test, if this result carries one
    pub fn service(&self, port: u16) -> Option<bool> {
        self.details
            .get("services")?
            .get(service_key(port))?
            .as_bool()
    }
}

/// Key used for a port in `details.services`
pub fn service_key(port: u16) -> String {
    format!("port_{}", port)
}
