//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{InvalidMacAddress, RegistryError};

/// Unique identifier for a terminal, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalId(Uuid);

impl TerminalId {
    /// Generate a fresh random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TerminalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TerminalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for TerminalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Normalized hardware address (`AA:BB:CC:DD:EE:FF`)
///
/// Parsing accepts colon, dash or dot separators (or none) in any case,
/// so two spellings of the same address always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse and normalize a MAC address
    pub fn parse(raw: &str) -> Result<Self, InvalidMacAddress> {
        let hex: String = raw
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
            .collect();

        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidMacAddress(raw.to_string()));
        }

        let upper = hex.to_ascii_uppercase();
        let octets: Vec<&str> = (0..6).map(|i| &upper[i * 2..i * 2 + 2]).collect();
        Ok(Self(octets.join(":")))
    }

    /// Normalized string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMacAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMacAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

/// Kind of physical location a terminal is installed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    /// Guest room, identified by room number
    Room,
    /// Lobby or reception area
    Lobby,
    /// Any other named place
    Other,
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationType::Room => write!(f, "ROOM"),
            LocationType::Lobby => write!(f, "LOBBY"),
            LocationType::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for LocationType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ROOM" => Ok(LocationType::Room),
            "LOBBY" => Ok(LocationType::Lobby),
            "OTHER" => Ok(LocationType::Other),
            other => Err(RegistryError::Invalid(format!(
                "unknown location type {:?}",
                other
            ))),
        }
    }
}

/// The single location a terminal is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationBinding {
    #[serde(rename = "locationType")]
    pub location_type: LocationType,
    #[serde(rename = "locationIdentifier")]
    pub identifier: String,
}

impl LocationBinding {
    /// Build a binding, rejecting blank identifiers
    pub fn new(
        location_type: LocationType,
        identifier: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let identifier = identifier.into().trim().to_string();
        if identifier.is_empty() {
            return Err(RegistryError::Invalid(
                "locationIdentifier must not be empty".to_string(),
            ));
        }
        Ok(Self {
            location_type,
            identifier,
        })
    }

    /// Build an optional binding from its two request fields.
    ///
    /// Both must be present or both absent.
    pub fn from_parts(
        location_type: Option<LocationType>,
        identifier: Option<&str>,
    ) -> Result<Option<Self>, RegistryError> {
        match (location_type, identifier) {
            (None, None) => Ok(None),
            (Some(location_type), Some(identifier)) => {
                Self::new(location_type, identifier).map(Some)
            }
            _ => Err(RegistryError::Invalid(
                "locationType and locationIdentifier must be given together".to_string(),
            )),
        }
    }
}

impl fmt::Display for LocationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.location_type, self.identifier)
    }
}
