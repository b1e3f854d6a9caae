//! Room directory backed by the server configuration

use std::collections::HashSet;

use async_trait::async_trait;

use tvf_core::error::StoreError;
use tvf_core::{Room, RoomDirectory};

/// Fixed set of room numbers, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct StaticRoomDirectory {
    rooms: HashSet<String>,
}

impl StaticRoomDirectory {
    /// Build from a list of room numbers; blank entries are ignored
    pub fn new<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rooms = numbers
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { rooms }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[async_trait]
impl RoomDirectory for StaticRoomDirectory {
    async fn find_room_by_number(&self, number: &str) -> Result<Option<Room>, StoreError> {
        let number = number.trim();
        Ok(self.rooms.contains(number).then(|| Room {
            number: number.to_string(),
        }))
    }
}
