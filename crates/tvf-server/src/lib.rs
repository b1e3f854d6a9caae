//! tvf-server: Liveness core of the hotel IPTV terminal fleet
//!
//! The server keeps a registry of every deployed set-top terminal and
//! reconciles its online status from two independent signals: heartbeats
//! sent by the terminals and connectivity probes started by the server.
//! A periodic sweeper demotes terminals that have gone quiet. The
//! [`FleetService`] façade ties these together and backs the HTTP API.

pub mod api;
pub mod fleet;
pub mod heartbeat;
pub mod location;
pub mod registry;
pub mod rooms;
pub mod sweeper;

pub use fleet::FleetService;
pub use heartbeat::{HeartbeatOutcome, HeartbeatReceiver};
pub use location::LocationManager;
pub use registry::{MemoryStore, TerminalRegistry, UpdateOutcome};
pub use rooms::StaticRoomDirectory;
pub use sweeper::{LivenessTransition, SweepReport, SweeperSettings};
