//! Database models for devices.

use crate::api::models::devices::{DeviceCreate, DeviceUpdate};
use crate::types::{DeviceId, DeviceState};
use chrono::{DateTime, Utc};

/// Database request for creating a new device
#[derive(Debug, Clone)]
pub struct DeviceCreateDBRequest {
    pub display_name: String,
    pub display_brand: String,
    pub state: DeviceState,
}

impl From<DeviceCreate> for DeviceCreateDBRequest {
    fn from(api: DeviceCreate) -> Self {
        // Presence is enforced by request validation before this conversion runs
        Self {
            display_name: api.display_name.unwrap_or_default(),
            display_brand: api.display_brand.unwrap_or_default(),
            state: api.state.unwrap_or(DeviceState::Available),
        }
    }
}

/// Database request for a partial device update
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdateDBRequest {
    pub display_name: Option<String>,
    pub display_brand: Option<String>,
    pub state: Option<DeviceState>,
    /// Version the caller based its decision on. When set, the update fails with
    /// `DbError::StaleVersion` unless the row still carries this version.
    pub expected_version: Option<i64>,
}

impl DeviceUpdateDBRequest {
    pub fn new(update: DeviceUpdate) -> Self {
        Self {
            display_name: update.display_name,
            display_brand: update.display_brand,
            state: update.state,
            expected_version: None,
        }
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Database response for a device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDBResponse {
    pub id: DeviceId,
    pub display_name: String,
    pub display_brand: String,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl DeviceDBResponse {
    pub fn is_in_use(&self) -> bool {
        self.state == DeviceState::InUse
    }
}
