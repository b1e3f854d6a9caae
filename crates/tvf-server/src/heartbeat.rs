//! Passive liveness channel
//!
//! Terminals report themselves by MAC address. A heartbeat from a known
//! terminal marks it online; anything else is dropped. Heartbeats never
//! register new terminals.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tvf_core::error::RegistryError;
use tvf_core::{MacAddress, TerminalId};

use crate::registry::TerminalRegistry;

/// What happened to a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Known terminal, liveness updated
    Recorded(TerminalId),
    /// No terminal with this MAC address (or the address was malformed)
    Unknown,
}

/// Applies terminal heartbeats to the registry
#[derive(Clone)]
pub struct HeartbeatReceiver {
    registry: Arc<TerminalRegistry>,
}

impl HeartbeatReceiver {
    pub fn new(registry: Arc<TerminalRegistry>) -> Self {
        Self { registry }
    }

    /// Handle a heartbeat received at `at`
    pub async fn on_heartbeat(
        &self,
        mac_address: &str,
        at: DateTime<Utc>,
    ) -> Result<HeartbeatOutcome, RegistryError> {
        let mac = match MacAddress::parse(mac_address) {
            Ok(mac) => mac,
            Err(e) => {
                tracing::warn!("Dropping heartbeat: {}", e);
                return Ok(HeartbeatOutcome::Unknown);
            }
        };

        let Some((before, after)) = self.registry.record_seen_by_mac(&mac, at).await? else {
            tracing::debug!("Heartbeat from unknown terminal {}", mac);
            return Ok(HeartbeatOutcome::Unknown);
        };

        if !before.is_online() {
            tracing::info!("Terminal {} is online (heartbeat)", after.terminal_code);
        } else {
            tracing::trace!("Heartbeat from {}", after.terminal_code);
        }
        Ok(HeartbeatOutcome::Recorded(after.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryStore;
    use tvf_core::{Terminal, TerminalSpec};

    async fn setup() -> (HeartbeatReceiver, Arc<TerminalRegistry>, Terminal) {
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
        (HeartbeatReceiver::new(Arc::clone(&registry)), registry, terminal)
    }

    #[tokio::test]
    async fn test_heartbeat_marks_online() {
        let (receiver, registry, terminal) = setup().await;
        let at = Utc::now();

        let outcome = receiver.on_heartbeat("aa-bb-cc-00-01-01", at).await.unwrap();
        assert_eq!(outcome, HeartbeatOutcome::Recorded(terminal.id));

        let stored = registry.get(&terminal.id).await.unwrap();
        assert!(stored.is_online());
        assert_eq!(stored.last_seen(), Some(at));
    }

    #[tokio::test]
    async fn test_repeated_heartbeat_only_moves_last_seen() {
        let (receiver, registry, terminal) = setup().await;
        let at = Utc::now();
        let later = at + chrono::Duration::seconds(1);

        receiver.on_heartbeat("AA:BB:CC:00:01:01", at).await.unwrap();
        let outcome = receiver.on_heartbeat("AA:BB:CC:00:01:01", later).await.unwrap();
        assert_eq!(outcome, HeartbeatOutcome::Recorded(terminal.id));

        let stored = registry.get(&terminal.id).await.unwrap();
        assert!(stored.is_online());
        assert_eq!(stored.last_seen(), Some(later));
        assert_eq!(stored.terminal_code, terminal.terminal_code);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_old_mac_ignored_after_change() {
        let (receiver, registry, terminal) = setup().await;
        let patch = tvf_core::TerminalPatch {
            mac_address: Some("AA:BB:CC:00:01:02".to_string()),
            ..Default::default()
        };
        registry.update(&terminal.id, &patch, Utc::now()).await.unwrap();

        let outcome = receiver.on_heartbeat("AA:BB:CC:00:01:01", Utc::now()).await.unwrap();
        assert_eq!(outcome, HeartbeatOutcome::Unknown);
        assert!(!registry.get(&terminal.id).await.unwrap().is_online());
    }

    #[tokio::test]
    async fn test_unknown_mac_changes_nothing() {
        let (receiver, registry, _) = setup().await;
        let before = registry.list().await.unwrap();

        let outcome = receiver
            .on_heartbeat("00:00:00:00:00:99", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, HeartbeatOutcome::Unknown);

        let outcome = receiver.on_heartbeat("not-a-mac", Utc::now()).await.unwrap();
        assert_eq!(outcome, HeartbeatOutcome::Unknown);

        let after = registry.list().await.unwrap();
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].liveness(), after[0].liveness());
    }
}
