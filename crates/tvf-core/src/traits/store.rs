//! Terminal persistence trait

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::terminal::Terminal;
use crate::types::{MacAddress, TerminalId};

/// Storage backend for terminal rows.
///
/// Implementations only store and fetch; uniqueness and liveness rules are
/// enforced by the registry above them.
#[async_trait]
pub trait TerminalStore: Send + Sync {
    /// Fetch one terminal
    async fn get(&self, id: &TerminalId) -> Result<Option<Terminal>, StoreError>;

    /// Insert or replace a terminal
    async fn put(&self, terminal: Terminal) -> Result<(), StoreError>;

    /// Remove a terminal, returning it if it existed
    async fn remove(&self, id: &TerminalId) -> Result<Option<Terminal>, StoreError>;

    /// All terminals, in no particular order
    async fn list(&self) -> Result<Vec<Terminal>, StoreError>;

    /// Look a terminal up by its terminal code.
    ///
    /// The provided lookups scan [`list`](Self::list); indexed backends
    /// should override them.
    async fn find_by_code(&self, code: &str) -> Result<Option<Terminal>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|t| t.terminal_code == code))
    }

    /// Look a terminal up by its normalized MAC address
    async fn find_by_mac(&self, mac: &MacAddress) -> Result<Option<Terminal>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|t| &t.mac_address == mac))
    }

    /// Look a terminal up by its IP address
    async fn find_by_ip(&self, ip: &IpAddr) -> Result<Option<Terminal>, StoreError> {
        Ok(self.list().await?.into_iter().find(|t| &t.ip_address == ip))
    }

    /// Make buffered writes durable
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
