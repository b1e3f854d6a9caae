//! tvf-probe: Active reachability probes for IPTV terminals
//!
//! This crate performs server-initiated connectivity checks against a
//! terminal's IP address. It is stateless: every call produces a fresh
//! [`ConnectivityTestResult`] and network failures are reported as data,
//! never as errors.

pub mod engine;
pub mod error;
pub mod icmp;
pub mod result;

pub use engine::{ProbeEngine, ProbeSettings, DEFAULT_SERVICE_PORTS};
pub use error::ProbeError;
pub use icmp::{IcmpProber, SystemPing};
pub use result::{service_key, ConnectivityTestResult, ProbeErrorCode, ProbeMethod};
