//! In-memory terminal store with optional JSON snapshot

use std::borrow::Borrow;
use std::hash::Hash;
use std::net::IpAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use tvf_core::error::StoreError;
use tvf_core::{MacAddress, Terminal, TerminalId, TerminalStore};

/// Terminal rows held in a concurrent map, indexed by every unique
/// identifier.
///
/// The secondary indexes are kept in step by [`TerminalStore::put`] and
/// [`TerminalStore::remove`]; they assume writes to the same row are not
/// issued concurrently, which the registry guarantees.
///
/// When a snapshot path is set, [`TerminalStore::flush`] writes every row to
/// that file as a JSON array and [`MemoryStore::open`] reads it back.
pub struct MemoryStore {
    terminals: DashMap<TerminalId, Terminal>,
    by_code: DashMap<String, TerminalId>,
    by_mac: DashMap<MacAddress, TerminalId>,
    by_ip: DashMap<IpAddr, TerminalId>,
    snapshot: Option<PathBuf>,
    flush_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self::with_snapshot(None)
    }

    /// Open a store backed by a snapshot file, loading it if it exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let store = Self::with_snapshot(Some(path.clone()));

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let rows: Vec<Terminal> = serde_json::from_slice(&bytes)?;
                for terminal in rows {
                    store.insert_row(terminal);
                }
                tracing::info!("Loaded {} terminals from {:?}", store.len(), path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No snapshot at {:?}, starting empty", path);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }

    fn with_snapshot(snapshot: Option<PathBuf>) -> Self {
        Self {
            terminals: DashMap::new(),
            by_code: DashMap::new(),
            by_mac: DashMap::new(),
            by_ip: DashMap::new(),
            snapshot,
            flush_lock: Mutex::new(()),
        }
    }

    /// Number of stored terminals
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    fn insert_row(&self, terminal: Terminal) {
        let id = terminal.id;
        let code = terminal.terminal_code.clone();
        let mac = terminal.mac_address.clone();
        let ip = terminal.ip_address;

        if let Some(previous) = self.terminals.insert(id, terminal) {
            if previous.terminal_code != code {
                self.by_code.remove_if(&previous.terminal_code, |_, owner| *owner == id);
            }
            if previous.mac_address != mac {
                self.by_mac.remove_if(&previous.mac_address, |_, owner| *owner == id);
            }
            if previous.ip_address != ip {
                self.by_ip.remove_if(&previous.ip_address, |_, owner| *owner == id);
            }
        }

        self.by_code.insert(code, id);
        self.by_mac.insert(mac, id);
        self.by_ip.insert(ip, id);
    }

    fn unindex(&self, terminal: &Terminal) {
        let id = terminal.id;
        self.by_code.remove_if(&terminal.terminal_code, |_, owner| *owner == id);
        self.by_mac.remove_if(&terminal.mac_address, |_, owner| *owner == id);
        self.by_ip.remove_if(&terminal.ip_address, |_, owner| *owner == id);
    }

    fn lookup<K, Q>(&self, index: &DashMap<K, TerminalId>, key: &Q) -> Option<Terminal>
    where
        K: Borrow<Q> + Hash + Eq,
        Q: Hash + Eq + ?Sized,
    {
        let id = *index.get(key)?.value();
        self.terminals.get(&id).map(|r| r.value().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalStore for MemoryStore {
    async fn get(&self, id: &TerminalId) -> Result<Option<Terminal>, StoreError> {
        Ok(self.terminals.get(id).map(|r| r.value().clone()))
    }

    async fn put(&self, terminal: Terminal) -> Result<(), StoreError> {
        self.insert_row(terminal);
        Ok(())
    }

    async fn remove(&self, id: &TerminalId) -> Result<Option<Terminal>, StoreError> {
        let removed = self.terminals.remove(id).map(|(_, t)| t);
        if let Some(terminal) = &removed {
            self.unindex(terminal);
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<Terminal>, StoreError> {
        Ok(self.terminals.iter().map(|r| r.value().clone()).collect())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Terminal>, StoreError> {
        Ok(self.lookup(&self.by_code, code))
    }

    async fn find_by_mac(&self, mac: &MacAddress) -> Result<Option<Terminal>, StoreError> {
        Ok(self.lookup(&self.by_mac, mac))
    }

    async fn find_by_ip(&self, ip: &IpAddr) -> Result<Option<Terminal>, StoreError> {
        Ok(self.lookup(&self.by_ip, ip))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        // One writer at a time; each flush captures rows after taking the lock
        let _guard = self.flush_lock.lock().await;

        let mut rows: Vec<Terminal> = self.terminals.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| a.terminal_code.cmp(&b.terminal_code));
        let bytes = serde_json::to_vec_pretty(&rows)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Readers never observe a partially written snapshot
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!("Flushed {} terminals to {:?}", rows.len(), path);
        Ok(())
    }
}
