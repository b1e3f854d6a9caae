//! Location assignment
//!
//! A terminal is bound to at most one location. `ROOM` bindings must name
//! a room the hotel actually has; `LOBBY` and `OTHER` identifiers are free
//! text. Resolution happens at assignment time only.

use std::sync::Arc;

use tvf_core::error::RegistryError;
use tvf_core::{LocationBinding, LocationType, RoomDirectory, Terminal, TerminalId};

use crate::registry::TerminalRegistry;

/// Validates and applies location bindings
#[derive(Clone)]
pub struct LocationManager {
    registry: Arc<TerminalRegistry>,
    rooms: Arc<dyn RoomDirectory>,
}

impl LocationManager {
    pub fn new(registry: Arc<TerminalRegistry>, rooms: Arc<dyn RoomDirectory>) -> Self {
        Self { registry, rooms }
    }

    /// Check that a binding refers to a location that exists
    pub async fn resolve(&self, binding: &LocationBinding) -> Result<(), RegistryError> {
        if binding.location_type != LocationType::Room {
            return Ok(());
        }

        match self.rooms.find_room_by_number(&binding.identifier).await? {
            Some(_) => Ok(()),
            None => Err(RegistryError::LocationNotFound {
                location_type: binding.location_type,
                identifier: binding.identifier.clone(),
            }),
        }
    }

    /// Bind a terminal to a location, replacing any previous binding
    pub async fn assign(
        &self,
        id: &TerminalId,
        location_type: LocationType,
        identifier: &str,
    ) -> Result<Terminal, RegistryError> {
        let binding = LocationBinding::new(location_type, identifier)?;
        self.registry.get(id).await?;
        self.resolve(&binding).await?;

        let terminal = self
            .registry
            .set_location(id, Some(binding), tvf_core::time::now())
            .await?;

        if let Some(location) = &terminal.location {
            tracing::info!("Terminal {} assigned to {}", terminal.terminal_code, location);
        }
        Ok(terminal)
    }

    /// Remove a terminal's location binding
    pub async fn clear(&self, id: &TerminalId) -> Result<Terminal, RegistryError> {
        let terminal = self
            .registry
            .set_location(id, None, tvf_core::time::now())
            .await?;
        tracing::info!("Terminal {} location cleared", terminal.terminal_code);
        Ok(terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryStore;
    use crate::rooms::StaticRoomDirectory;
    use chrono::Utc;
    use tvf_core::TerminalSpec;

    async fn setup() -> (LocationManager, Terminal) {
        let registry = Arc::new(TerminalRegistry::new(Arc::new(MemoryStore::new())));
        let terminal = Terminal::from_spec(
            TerminalSpec {
                terminal_code: "STB-101".to_string(),
                ip_address: "10.0.1.101".to_string(),
                mac_address: "AA:BB:CC:00:01:01".to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        let terminal = registry.insert(terminal).await.unwrap();
        let rooms = Arc::new(StaticRoomDirectory::new(["101", "102"]));
        (LocationManager::new(registry, rooms), terminal)
    }

    #[tokio::test]
    async fn test_room_then_lobby_leaves_single_binding() {
        let (manager, terminal) = setup().await;

        let in_room = manager
            .assign(&terminal.id, LocationType::Room, "101")
            .await
            .unwrap();
        assert_eq!(in_room.location_type(), Some(LocationType::Room));

        let in_lobby = manager
            .assign(&terminal.id, LocationType::Lobby, "main")
            .await
            .unwrap();
        let location = in_lobby.location.unwrap();
        assert_eq!(location.location_type, LocationType::Lobby);
        assert_eq!(location.identifier, "main");
    }

    #[tokio::test]
    async fn test_unknown_room_rejected() {
        let (manager, terminal) = setup().await;

        let err = manager
            .assign(&terminal.id, LocationType::Room, "999")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::LocationNotFound { .. }));

        // Free-text locations are not resolved
        manager
            .assign(&terminal.id, LocationType::Other, "pool bar")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_blank_identifier_and_missing_terminal() {
        let (manager, terminal) = setup().await;

        assert!(matches!(
            manager.assign(&terminal.id, LocationType::Lobby, "  ").await,
            Err(RegistryError::Invalid(_))
        ));
        assert!(matches!(
            manager.assign(&TerminalId::new(), LocationType::Room, "101").await,
            Err(RegistryError::TerminalNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let (manager, terminal) = setup().await;
        manager
            .assign(&terminal.id, LocationType::Room, "102")
            .await
            .unwrap();

        let cleared = manager.clear(&terminal.id).await.unwrap();
        assert!(cleared.location.is_none());
    }
}
