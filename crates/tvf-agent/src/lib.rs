//! tvf-agent: Heartbeat agent for IPTV terminals
//!
//! The agent runs on a set-top box (or as a simulator for one) and tells
//! the fleet server it is alive by posting its MAC address on a fixed
//! cadence. Failed deliveries are retried with exponential backoff.

pub mod backoff;
pub mod heartbeat;

pub use backoff::ExponentialBackoff;
pub use heartbeat::{run_heartbeat_loop, HeartbeatClient, HeartbeatError};
