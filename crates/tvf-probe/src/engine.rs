//! Probe engine
//!
//! Two probes are offered:
//!
//! - [`ProbeEngine::ping_host`] tries a TCP connect to the primary
//!   management port and falls back to an ICMP-style check when that fails.
//!   TCP goes first because many networks drop ICMP but pass TCP.
//! - [`ProbeEngine::test_terminal_services`] checks a fixed set of IPTV
//!   service ports concurrently and succeeds if any of them accepts.
//!
//! Every socket wait is bounded by a timeout; nothing here blocks forever.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::net::TcpStream;

use crate::error::ProbeError;
use crate::icmp::{IcmpProber, SystemPing};
use crate::result::{service_key, ConnectivityTestResult, ProbeErrorCode, ProbeMethod};

/// HTTP, HTTPS, alt-HTTP, RTSP, RTMP
pub const DEFAULT_SERVICE_PORTS: [u16; 5] = [80, 443, 8080, 554, 1935];

/// Probe tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Timeout for the primary TCP connect and the ICMP fallback
    pub timeout_ms: u64,

    /// Per-port timeout for the service test
    pub service_timeout_ms: u64,

    /// Port used by the primary TCP probe
    pub primary_port: u16,

    /// Ports checked by the service test
    pub service_ports: Vec<u16>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            service_timeout_ms: 2000,
            primary_port: 80,
            service_ports: DEFAULT_SERVICE_PORTS.to_vec(),
        }
    }
}

impl ProbeSettings {
    /// Primary probe timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-port service test timeout
    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }
}

/// Stateless reachability tester
#[derive(Clone)]
pub struct ProbeEngine {
    settings: ProbeSettings,
    icmp: Arc<dyn IcmpProber>,
}

impl ProbeEngine {
    /// Create an engine using the system `ping` utility as ICMP fallback
    pub fn new(settings: ProbeSettings) -> Self {
        Self::with_icmp(settings, Arc::new(SystemPing))
    }

    /// Create an engine with a custom ICMP fallback
    pub fn with_icmp(settings: ProbeSettings, icmp: Arc<dyn IcmpProber>) -> Self {
        Self { settings, icmp }
    }

    /// TCP probe with ICMP fallback against an address string.
    ///
    /// Fails only if `ip` is not an IP literal.
    pub async fn ping_host(&self, ip: &str) -> Result<ConnectivityTestResult, ProbeError> {
        let addr = parse_ip(ip)?;
        Ok(self.ping(addr).await)
    }

    /// TCP probe with ICMP fallback
    pub async fn ping(&self, ip: IpAddr) -> ConnectivityTestResult {
        let timeout = self.settings.timeout();
        let port = self.settings.primary_port;
        let started = Instant::now();

        match tcp_connect(SocketAddr::new(ip, port), timeout).await {
            Ok(()) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                tracing::debug!("TCP probe {}:{} succeeded in {}ms", ip, port, latency_ms);
                return ConnectivityTestResult::reachable(
                    ProbeMethod::TcpConnect,
                    format!("TCP connection to {}:{} succeeded", ip, port),
                )
                .with_detail("port", port)
                .with_detail("host", ip.to_string())
                .with_detail("latencyMs", latency_ms);
            }
            Err(e) => {
                tracing::debug!("TCP probe {}:{} failed ({}), falling back to ping", ip, port, e);
            }
        }

        match self.icmp.is_reachable(ip, timeout).await {
            Ok(true) => ConnectivityTestResult::reachable(
                ProbeMethod::IcmpPing,
                format!("Host {} answered ICMP echo", ip),
            )
            .with_detail("host", ip.to_string()),

            Ok(false) => ConnectivityTestResult::unreachable(
                ProbeMethod::IcmpPing,
                format!("Host {} is not reachable", ip),
            )
            .with_error_code(ProbeErrorCode::HostUnreachable)
            .with_detail("host", ip.to_string())
            .with_detail("port", port),

            Err(e) => {
                tracing::warn!("ICMP fallback for {} could not run: {}", ip, e);
                ConnectivityTestResult::unreachable(
                    ProbeMethod::IcmpPing,
                    format!("Ping to {} failed: {}", ip, e),
                )
                .with_error_code(ProbeErrorCode::PingFailed)
                .with_detail("host", ip.to_string())
                .with_detail("error", e.to_string())
            }
        }
    }

    /// Multi-port service test against an address string.
    ///
    /// Fails only if `ip` is not an IP literal.
    pub async fn test_terminal_services(
        &self,
        ip: &str,
    ) -> Result<ConnectivityTestResult, ProbeError> {
        let addr = parse_ip(ip)?;
        Ok(self.test_services(addr).await)
    }

    /// Multi-port service test: success if any port accepts a connection
    pub async fn test_services(&self, ip: IpAddr) -> ConnectivityTestResult {
        let timeout = self.settings.service_timeout();

        let checks = self.settings.service_ports.iter().map(|&port| async move {
            let open = tcp_connect(SocketAddr::new(ip, port), timeout).await.is_ok();
            (port, open)
        });
        let outcomes = futures::future::join_all(checks).await;

        let open_count = outcomes.iter().filter(|(_, open)| *open).count();
        let services: Map<String, Value> = outcomes
            .iter()
            .map(|(port, open)| (service_key(*port), Value::Bool(*open)))
            .collect();

        tracing::debug!(
            "Service test {}: {}/{} ports reachable",
            ip,
            open_count,
            outcomes.len()
        );

        let message = format!(
            "{} of {} services reachable on {}",
            open_count,
            outcomes.len(),
            ip
        );
        let result = if open_count > 0 {
            ConnectivityTestResult::reachable(ProbeMethod::ServiceTest, message)
        } else {
            ConnectivityTestResult::unreachable(ProbeMethod::ServiceTest, message)
        };

        result
            .with_detail("host", ip.to_string())
            .with_detail("services", Value::Object(services))
    }
}

impl std::fmt::Debug for ProbeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn parse_ip(ip: &str) -> Result<IpAddr, ProbeError> {
    ip.trim()
        .parse::<IpAddr>()
        .map_err(|_| ProbeError::InvalidAddress(ip.to_string()))
}

async fn tcp_connect(addr: SocketAddr, timeout: Duration) -> io::Result<()> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out after {:?}", addr, timeout),
        )),
    }
}
