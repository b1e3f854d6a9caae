//! Core trait definitions

mod rooms;
mod store;

pub use rooms::{Room, RoomDirectory};
pub use store::TerminalStore;
