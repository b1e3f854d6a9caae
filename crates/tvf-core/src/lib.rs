//! tvf-core: Core abstractions and configuration for tvfleet
//!
//! This crate provides the terminal entity, shared identifiers, the
//! persistence and room-lookup traits, API payloads and configuration
//! structures used by the server and the terminal agent.

pub mod api;
pub mod config;
pub mod error;
pub mod terminal;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ConfigError, FleetError, IdentifierField, RegistryError, StoreError};
pub use terminal::{Liveness, Terminal, TerminalPatch, TerminalSpec};
pub use types::{LocationBinding, LocationType, MacAddress, TerminalId};
pub use traits::{Room, RoomDirectory, TerminalStore};
