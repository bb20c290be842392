//! API request/response models for devices.

use crate::api::models::pagination::PageParams;
use crate::config::PaginationConfig;
use crate::db::handlers::devices::{DeviceFilter, DeviceSort, SortDirection, SortField};
use crate::db::models::devices::DeviceDBResponse;
use crate::errors::{Error, Result};
use crate::types::{DeviceId, DeviceState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Strings are trimmed on the way in so a blank value fails the length check.
fn trimmed<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()))
}

/// Request body for registering a device
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCreate {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "must not be blank"),
        length(min = 1, max = 255, message = "size must be between 1 and 255")
    )]
    #[schema(value_type = String, example = "iPhone 15 Pro", min_length = 1, max_length = 255)]
    pub display_name: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "must not be blank"),
        length(min = 1, max = 100, message = "size must be between 1 and 100")
    )]
    #[schema(value_type = String, example = "Apple", min_length = 1, max_length = 100)]
    pub display_brand: Option<String>,

    /// Initial state (default: AVAILABLE)
    pub state: Option<DeviceState>,
}

/// Partial update; omitted fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255, message = "size must be between 1 and 255"))]
    #[schema(example = "iPhone 15 Pro Max", min_length = 1, max_length = 255)]
    pub display_name: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "size must be between 1 and 100"))]
    #[schema(example = "Apple", min_length = 1, max_length = 100)]
    pub display_brand: Option<String>,

    pub state: Option<DeviceState>,
}

/// Device response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    /// Device unique identifier
    #[schema(value_type = String, format = "uuid", example = "123e4567-e89b-12d3-a456-426614174000")]
    pub id: DeviceId,
    #[schema(example = "iPhone 15 Pro")]
    pub display_name: String,
    #[schema(example = "Apple")]
    pub display_brand: String,
    pub state: DeviceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Resource version for optimistic locking
    #[schema(example = 1)]
    pub version: i64,
}

impl From<DeviceDBResponse> for DeviceResponse {
    fn from(db: DeviceDBResponse) -> Self {
        Self {
            id: db.id,
            display_name: db.display_name,
            display_brand: db.display_brand,
            state: db.state,
            created_at: db.created_at,
            updated_at: db.updated_at,
            version: db.version,
        }
    }
}

/// Query parameters for listing devices
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListDevicesQuery {
    /// Exact name match, case-insensitive
    pub name: Option<String>,

    /// Exact brand match, case-insensitive
    pub brand: Option<String>,

    pub state: Option<DeviceState>,

    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PageParams,
}

impl ListDevicesQuery {
    /// Resolve defaults and limits into a repository filter
    pub fn to_filter(&self, limits: &PaginationConfig) -> Result<DeviceFilter> {
        let mut filter =
            DeviceFilter::new(self.pagination.page()?, self.pagination.size(limits)?).with_sort(parse_sort(self.pagination.sort())?);

        if let Some(name) = &self.name {
            filter = filter.with_name(name.clone());
        }
        if let Some(brand) = &self.brand {
            filter = filter.with_brand(brand.clone());
        }
        if let Some(state) = self.state {
            filter = filter.with_state(state);
        }

        Ok(filter)
    }
}

/// Parse `property[,direction]`. Anything other than `asc` (any case) sorts descending.
pub fn parse_sort(expression: &str) -> Result<DeviceSort> {
    let mut parts = expression.split(',').map(str::trim);
    let property = parts.next().unwrap_or_default();

    let field = property.parse::<SortField>().map_err(|message| Error::BadRequest { message })?;
    let direction = match parts.next() {
        Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
        _ => SortDirection::Desc,
    };

    Ok(DeviceSort { field, direction })
}
