//! Terminal registry
//!
//! The registry is the only writer of terminal rows. It enforces the three
//! uniqueness guards (terminal code, MAC address, IP address) and exposes
//! the narrow liveness operations used by heartbeats, probes and the
//! sweeper.
//!
//! # Atomicity Model
//!
//! Every read-modify-write sequence runs under one mutex, so a guard check
//! and the write it protects cannot interleave with another writer. Reads
//! go straight to the store without locking.

mod memory;

pub use memory::MemoryStore;

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use tvf_core::error::{IdentifierField, RegistryError};
use tvf_core::{LocationBinding, MacAddress, Terminal, TerminalId, TerminalPatch, TerminalStore};

/// Result of a successful update
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Terminal after the update
    pub terminal: Terminal,
    /// Whether the IP address changed
    pub ip_changed: bool,
}

/// Persisted state of every terminal
pub struct TerminalRegistry {
    store: Arc<dyn TerminalStore>,
    write_lock: Mutex<()>,
}

impl TerminalRegistry {
    /// Create a registry over a store
    pub fn new(store: Arc<dyn TerminalStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Insert a new terminal after checking every uniqueness guard
    pub async fn insert(&self, terminal: Terminal) -> Result<Terminal, RegistryError> {
        let _lock = self.write_lock.lock().await;

        self.check_unique(&terminal, None).await?;
        self.store.put(terminal.clone()).await?;

        tracing::info!(
            "Registered terminal {} ({}, {}, {})",
            terminal.terminal_code,
            terminal.id,
            terminal.mac_address,
            terminal.ip_address
        );
        Ok(terminal)
    }

    /// Fetch a terminal
    pub async fn get(&self, id: &TerminalId) -> Result<Terminal, RegistryError> {
        self.store
            .get(id)
            .await?
            .ok_or(RegistryError::TerminalNotFound(*id))
    }

    /// All terminals, ordered by terminal code
    pub async fn list(&self) -> Result<Vec<Terminal>, RegistryError> {
        let mut terminals = self.store.list().await?;
        terminals.sort_by(|a, b| a.terminal_code.cmp(&b.terminal_code));
        Ok(terminals)
    }

    /// Apply a validated patch.
    ///
    /// The guards are only checked for fields the patch actually changes.
    /// On any violation nothing is written.
    pub async fn update(
        &self,
        id: &TerminalId,
        patch: &TerminalPatch,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, RegistryError> {
        let _lock = self.write_lock.lock().await;

        let current = self.get(id).await?;
        let next = current.patched(patch, now)?;
        self.check_unique(&next, Some(&current)).await?;
        self.store.put(next.clone()).await?;

        let ip_changed = next.ip_address != current.ip_address;
        if ip_changed {
            tracing::info!(
                "Terminal {} moved from {} to {}",
                next.terminal_code,
                current.ip_address,
                next.ip_address
            );
        } else {
            tracing::debug!("Updated terminal {}", next.terminal_code);
        }

        Ok(UpdateOutcome {
            terminal: next,
            ip_changed,
        })
    }

    /// Remove a terminal
    pub async fn delete(&self, id: &TerminalId) -> Result<Terminal, RegistryError> {
        let _lock = self.write_lock.lock().await;

        let removed = self
            .store
            .remove(id)
            .await?
            .ok_or(RegistryError::TerminalNotFound(*id))?;

        tracing::info!("Deleted terminal {} ({})", removed.terminal_code, removed.id);
        Ok(removed)
    }

    /// Record a sign of life: `online = true`, `lastSeen = at`
    #[cfg(test)]
    pub(crate) async fn record_seen(
        &self,
        id: &TerminalId,
        at: DateTime<Utc>,
    ) -> Result<Terminal, RegistryError> {
        self.modify(id, |t| t.mark_seen(at)).await
    }

    /// Record a heartbeat from `mac`.
    ///
    /// The lookup and the write happen under the same lock, so a terminal
    /// whose MAC address was just changed is not marked seen for its old
    /// address. Returns the terminal as it was before and after the write,
    /// or `None` if no terminal has this address.
    pub async fn record_seen_by_mac(
        &self,
        mac: &MacAddress,
        at: DateTime<Utc>,
    ) -> Result<Option<(Terminal, Terminal)>, RegistryError> {
        let _lock = self.write_lock.lock().await;

        let Some(before) = self.store.find_by_mac(mac).await? else {
            return Ok(None);
        };
        let mut after = before.clone();
        after.mark_seen(at);
        self.store.put(after.clone()).await?;
        Ok(Some((before, after)))
    }

    /// Record a successful probe of `ip`.
    ///
    /// Returns `false` without writing if the terminal was deleted or its IP
    /// address changed since the probe started.
    pub async fn record_probe_success(
        &self,
        id: &TerminalId,
        ip: IpAddr,
        at: DateTime<Utc>,
    ) -> Result<bool, RegistryError> {
        let _lock = self.write_lock.lock().await;

        let Some(mut terminal) = self.store.get(id).await? else {
            return Ok(false);
        };
        if terminal.ip_address != ip {
            return Ok(false);
        }

        terminal.mark_seen(at);
        self.store.put(terminal).await?;
        Ok(true)
    }

    /// Move `lastSeen` forward without touching the online flag
    pub async fn refresh_last_seen(
        &self,
        id: &TerminalId,
        at: DateTime<Utc>,
    ) -> Result<Terminal, RegistryError> {
        self.modify(id, |t| t.refresh_last_seen(at)).await
    }

    /// Demote a terminal to offline if it is online and was last seen
    /// before `threshold`. Returns whether it was demoted.
    ///
    /// The staleness check is repeated under the write lock, so a heartbeat
    /// that lands between selection and demotion wins.
    pub async fn demote_if_stale(
        &self,
        id: &TerminalId,
        threshold: DateTime<Utc>,
    ) -> Result<bool, RegistryError> {
        let _lock = self.write_lock.lock().await;

        let mut terminal = self.get(id).await?;
        if !terminal.demote_if_stale(threshold) {
            return Ok(false);
        }
        self.store.put(terminal).await?;
        Ok(true)
    }

    /// Replace the location binding (full replace, never a merge)
    pub async fn set_location(
        &self,
        id: &TerminalId,
        location: Option<LocationBinding>,
        now: DateTime<Utc>,
    ) -> Result<Terminal, RegistryError> {
        self.modify(id, |t| t.bind_location(location, now)).await
    }

    /// Enable or disable a terminal administratively
    pub async fn set_active(
        &self,
        id: &TerminalId,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Terminal, RegistryError> {
        self.modify(id, |t| {
            t.active = active;
            t.updated_at = now;
        })
        .await
    }

    /// Terminals last seen before `threshold`.
    ///
    /// Terminals that were never seen are not included.
    pub async fn list_inactive_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Terminal>, RegistryError> {
        let mut stale: Vec<Terminal> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|t| t.liveness().is_stale(threshold))
            .collect();
        stale.sort_by_key(|t| t.last_seen());
        Ok(stale)
    }

    /// Make pending writes durable
    pub async fn flush(&self) -> Result<(), RegistryError> {
        Ok(self.store.flush().await?)
    }

    async fn modify<F>(&self, id: &TerminalId, apply: F) -> Result<Terminal, RegistryError>
    where
        F: FnOnce(&mut Terminal),
    {
        let _lock = self.write_lock.lock().await;

        let mut terminal = self.get(id).await?;
        apply(&mut terminal);
        self.store.put(terminal.clone()).await?;
        Ok(terminal)
    }

    /// Check `candidate` against every other terminal.
    ///
    /// With `current` set, only fields that differ from it are checked.
    async fn check_unique(
        &self,
        candidate: &Terminal,
        current: Option<&Terminal>,
    ) -> Result<(), RegistryError> {
        let taken = |found: Option<Terminal>| found.is_some_and(|other| other.id != candidate.id);

        if current.map_or(true, |c| c.terminal_code != candidate.terminal_code)
            && taken(self.store.find_by_code(&candidate.terminal_code).await?)
        {
            return Err(duplicate(IdentifierField::TerminalCode, &candidate.terminal_code));
        }
        if current.map_or(true, |c| c.mac_address != candidate.mac_address)
            && taken(self.store.find_by_mac(&candidate.mac_address).await?)
        {
            return Err(duplicate(IdentifierField::MacAddress, &candidate.mac_address));
        }
        if current.map_or(true, |c| c.ip_address != candidate.ip_address)
            && taken(self.store.find_by_ip(&candidate.ip_address).await?)
        {
            return Err(duplicate(IdentifierField::IpAddress, &candidate.ip_address));
        }
        Ok(())
    }
}

fn duplicate(field: IdentifierField, value: &impl ToString) -> RegistryError {
    tracing::debug!("Rejected duplicate {}", field);
    RegistryError::DuplicateIdentifier {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tvf_core::{LocationType, TerminalSpec};

    fn registry() -> TerminalRegistry {
        TerminalRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn spec(code: &str, ip: &str, mac: &str) -> TerminalSpec {
        TerminalSpec {
            terminal_code: code.to_string(),
            ip_address: ip.to_string(),
            mac_address: mac.to_string(),
            ..Default::default()
        }
    }

    async fn insert(registry: &TerminalRegistry, code: &str, ip: &str, mac: &str) -> Terminal {
        let terminal = Terminal::from_spec(spec(code, ip, mac), Utc::now()).unwrap();
        registry.insert(terminal).await.unwrap()
    }

    fn assert_duplicate(err: RegistryError, expected: IdentifierField) {
        match err {
            RegistryError::DuplicateIdentifier { field, .. } => assert_eq!(field, expected),
            other => panic!("expected duplicate {}, got {:?}", expected, other),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_each_duplicate_field() {
        let registry = registry();
        insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;

        let cases = [
            (spec("STB-1", "10.0.0.2", "00:00:00:00:00:02"), IdentifierField::TerminalCode),
            (spec("STB-2", "10.0.0.2", "00-00-00-00-00-01"), IdentifierField::MacAddress),
            (spec("STB-2", "10.0.0.1", "00:00:00:00:00:02"), IdentifierField::IpAddress),
        ];
        for (spec, field) in cases {
            let terminal = Terminal::from_spec(spec, Utc::now()).unwrap();
            assert_duplicate(registry.insert(terminal).await.unwrap_err(), field);
        }

        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_duplicate_leaves_row_unchanged() {
        let registry = registry();
        insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;
        let second = insert(&registry, "STB-2", "10.0.0.2", "00:00:00:00:00:02").await;

        let patch = TerminalPatch {
            brand: Some("Acme".to_string()),
            ip_address: Some("10.0.0.1".to_string()),
            ..Default::default()
        };
        let err = registry.update(&second.id, &patch, Utc::now()).await.unwrap_err();
        assert_duplicate(err, IdentifierField::IpAddress);

        let stored = registry.get(&second.id).await.unwrap();
        assert_eq!(stored.ip_address, second.ip_address);
        assert_eq!(stored.brand, None);
    }

    #[tokio::test]
    async fn test_update_keeping_own_identifiers_passes() {
        let registry = registry();
        let terminal = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;

        let patch = TerminalPatch {
            terminal_code: Some("STB-1".to_string()),
            ip_address: Some("10.0.0.1".to_string()),
            model: Some("X1".to_string()),
            ..Default::default()
        };
        let outcome = registry.update(&terminal.id, &patch, Utc::now()).await.unwrap();
        assert!(!outcome.ip_changed);
        assert_eq!(outcome.terminal.model.as_deref(), Some("X1"));

        let patch = TerminalPatch {
            ip_address: Some("10.0.0.9".to_string()),
            ..Default::default()
        };
        let outcome = registry.update(&terminal.id, &patch, Utc::now()).await.unwrap();
        assert!(outcome.ip_changed);
    }

    #[tokio::test]
    async fn test_missing_terminal() {
        let registry = registry();
        let id = TerminalId::new();

        assert!(matches!(
            registry.get(&id).await,
            Err(RegistryError::TerminalNotFound(_))
        ));
        assert!(matches!(
            registry.delete(&id).await,
            Err(RegistryError::TerminalNotFound(_))
        ));
        assert!(matches!(
            registry.record_seen(&id, Utc::now()).await,
            Err(RegistryError::TerminalNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_demote_only_when_stale() {
        let registry = registry();
        let terminal = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;
        let now = Utc::now();

        // Never seen: already offline, nothing to demote
        assert!(!registry.demote_if_stale(&terminal.id, now).await.unwrap());

        registry
            .record_seen(&terminal.id, now - Duration::minutes(1))
            .await
            .unwrap();
        assert!(!registry
            .demote_if_stale(&terminal.id, now - Duration::minutes(5))
            .await
            .unwrap());
        assert!(registry.demote_if_stale(&terminal.id, now).await.unwrap());
        assert!(!registry.get(&terminal.id).await.unwrap().is_online());

        // Second pass finds it already offline
        assert!(!registry.demote_if_stale(&terminal.id, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_last_seen_keeps_online_flag() {
        let registry = registry();
        let terminal = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;
        let now = Utc::now();

        let refreshed = registry.refresh_last_seen(&terminal.id, now).await.unwrap();
        assert!(!refreshed.is_online());
        assert_eq!(refreshed.last_seen(), Some(now));
    }

    #[tokio::test]
    async fn test_record_seen_by_mac_follows_current_address() {
        let registry = registry();
        let terminal = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;
        let old_mac = terminal.mac_address.clone();

        let patch = TerminalPatch {
            mac_address: Some("00:00:00:00:00:02".to_string()),
            ..Default::default()
        };
        registry.update(&terminal.id, &patch, Utc::now()).await.unwrap();

        assert!(registry
            .record_seen_by_mac(&old_mac, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(!registry.get(&terminal.id).await.unwrap().is_online());

        let new_mac = MacAddress::parse("00-00-00-00-00-02").unwrap();
        let at = Utc::now();
        let (before, after) = registry
            .record_seen_by_mac(&new_mac, at)
            .await
            .unwrap()
            .unwrap();
        assert!(!before.is_online());
        assert!(after.is_online());
        assert_eq!(after.last_seen(), Some(at));
    }

    #[tokio::test]
    async fn test_freed_identifiers_can_be_reused() {
        let registry = registry();
        let first = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;

        let patch = TerminalPatch {
            terminal_code: Some("STB-9".to_string()),
            ip_address: Some("10.0.0.9".to_string()),
            ..Default::default()
        };
        registry.update(&first.id, &patch, Utc::now()).await.unwrap();
        insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:02").await;

        registry.delete(&first.id).await.unwrap();
        insert(&registry, "STB-9", "10.0.0.9", "00:00:00:00:00:01").await;
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_probe_success_discarded_after_ip_change() {
        let registry = registry();
        let terminal = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;
        let old_ip = terminal.ip_address;

        let patch = TerminalPatch {
            ip_address: Some("10.0.0.2".to_string()),
            ..Default::default()
        };
        registry.update(&terminal.id, &patch, Utc::now()).await.unwrap();

        assert!(!registry
            .record_probe_success(&terminal.id, old_ip, Utc::now())
            .await
            .unwrap());
        assert!(!registry.get(&terminal.id).await.unwrap().is_online());

        assert!(!registry
            .record_probe_success(&TerminalId::new(), old_ip, Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_location_replaced_not_merged() {
        let registry = registry();
        let terminal = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;

        let room = LocationBinding::new(LocationType::Room, "101").unwrap();
        registry
            .set_location(&terminal.id, Some(room), Utc::now())
            .await
            .unwrap();

        let lobby = LocationBinding::new(LocationType::Lobby, "main").unwrap();
        let updated = registry
            .set_location(&terminal.id, Some(lobby.clone()), Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.location, Some(lobby));

        let cleared = registry
            .set_location(&terminal.id, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(cleared.location, None);
    }

    #[tokio::test]
    async fn test_list_inactive_since_skips_never_seen() {
        let registry = registry();
        let now = Utc::now();
        let old = insert(&registry, "STB-1", "10.0.0.1", "00:00:00:00:00:01").await;
        let fresh = insert(&registry, "STB-2", "10.0.0.2", "00:00:00:00:00:02").await;
        insert(&registry, "STB-3", "10.0.0.3", "00:00:00:00:00:03").await;

        registry
            .record_seen(&old.id, now - Duration::hours(1))
            .await
            .unwrap();
        registry.record_seen(&fresh.id, now).await.unwrap();

        let inactive = registry
            .list_inactive_since(now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].id, old.id);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_with_same_mac() {
        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let terminal = Terminal::from_spec(
                    spec(&format!("STB-{}", i), &format!("10.0.0.{}", i + 1), "00:00:00:00:00:01"),
                    Utc::now(),
                )
                .unwrap();
                registry.insert(terminal).await.is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }
}
