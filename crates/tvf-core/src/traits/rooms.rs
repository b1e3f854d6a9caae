//! Room lookup collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A hotel room a terminal can be installed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub number: String,
}

/// Resolves room numbers for `ROOM` location bindings
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Find a room by its number
    async fn find_room_by_number(&self, number: &str) -> Result<Option<Room>, StoreError>;
}
