//! Common type definitions shared by the API and database layers.
//!
//! # ID Types
//!
//! - [`DeviceId`]: Device identifier, a UUID generated when the device is created
//!
//! # Device State
//!
//! [`DeviceState`] is the lifecycle state of a device. It is serialized as
//! `SCREAMING_SNAKE_CASE` on the wire and stored as the same text in PostgreSQL, where a
//! `CHECK` constraint limits the column to the known values.
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging
//! - [`normalize`]: Produce the case-insensitive search key for names and brands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

pub type DeviceId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Search key for a display value: surrounding whitespace trimmed, then lowercased.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Lifecycle state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Available,
    InUse,
    Inactive,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Available => "AVAILABLE",
            DeviceState::InUse => "IN_USE",
            DeviceState::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown device state: {0}")]
pub struct UnknownDeviceState(pub String);

impl FromStr for DeviceState {
    type Err = UnknownDeviceState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(DeviceState::Available),
            "IN_USE" => Ok(DeviceState::InUse),
            "INACTIVE" => Ok(DeviceState::Inactive),
            other => Err(UnknownDeviceState(other.to_string())),
        }
    }
}

// Used by sqlx when decoding the `state` column
impl TryFrom<String> for DeviceState {
    type Error = UnknownDeviceState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
