//! Core error types for tvfleet

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::{LocationType, TerminalId};

/// Top-level error type for fleet operations
#[derive(Error, Debug)]
pub enum FleetError {
    /// Registry rule violated or row missing
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<StoreError> for FleetError {
    fn from(e: StoreError) -> Self {
        FleetError::Registry(RegistryError::Store(e))
    }
}

/// Identifier covered by a uniqueness guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierField {
    /// Human-assigned terminal code
    TerminalCode,
    /// Hardware address
    MacAddress,
    /// Network address
    IpAddress,
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierField::TerminalCode => write!(f, "terminalCode"),
            IdentifierField::MacAddress => write!(f, "macAddress"),
            IdentifierField::IpAddress => write!(f, "ipAddress"),
        }
    }
}

/// Errors surfaced by registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Another terminal already uses this identifier
    #[error("Duplicate {field}: {value} is already registered")]
    DuplicateIdentifier {
        field: IdentifierField,
        value: String,
    },

    /// No terminal with this ID
    #[error("Terminal not found: {0}")]
    TerminalNotFound(TerminalId),

    /// Location reference does not resolve
    #[error("Location not found: {location_type} {identifier}")]
    LocationNotFound {
        location_type: LocationType,
        identifier: String,
    },

    /// Malformed request data
    #[error("Invalid terminal data: {0}")]
    Invalid(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<InvalidMacAddress> for RegistryError {
    fn from(e: InvalidMacAddress) -> Self {
        RegistryError::Invalid(e.to_string())
    }
}

/// Persistence-layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend cannot serve the request right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// MAC address that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid MAC address: {0:?}")]
pub struct InvalidMacAddress(pub String);

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
