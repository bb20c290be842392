//! Database repository for devices.
//!
//! Rows with `deleted_at` set are soft-deleted and every query here excludes them, so a
//! deleted device behaves exactly like one that never existed. Writes keep the normalized
//! `name`/`brand` search columns in step with the display values and bump `version` on every
//! effective change.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::devices::{DeviceCreateDBRequest, DeviceDBResponse, DeviceUpdateDBRequest},
};
use crate::types::{DeviceId, DeviceState, abbrev_uuid, normalize};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

/// Column a device listing can be ordered by.
///
/// Parsed from (and displayed as) the camelCase property names used by the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DisplayName,
    DisplayBrand,
    Name,
    Brand,
    State,
}

impl SortField {
    pub const ALL: [SortField; 7] = [
        SortField::CreatedAt,
        SortField::UpdatedAt,
        SortField::DisplayName,
        SortField::DisplayBrand,
        SortField::Name,
        SortField::Brand,
        SortField::State,
    ];

    fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::DisplayName => "display_name",
            SortField::DisplayBrand => "display_brand",
            SortField::Name => "name",
            SortField::Brand => "brand",
            SortField::State => "state",
        }
    }

    pub fn property(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::DisplayName => "displayName",
            SortField::DisplayBrand => "displayBrand",
            SortField::Name => "name",
            SortField::Brand => "brand",
            SortField::State => "state",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SortField::ALL
            .into_iter()
            .find(|field| field.property() == s)
            .ok_or_else(|| format!("Unknown sort property '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordering for device listings. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceSort {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Filter for listing devices
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    /// Exact match on the normalized name
    pub name: Option<String>,
    /// Exact match on the normalized brand
    pub brand: Option<String>,
    pub state: Option<DeviceState>,
    /// Zero-based page index
    pub page: i64,
    pub size: i64,
    pub sort: DeviceSort,
}

impl DeviceFilter {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            name: None,
            brand: None,
            state: None,
            page,
            size,
            sort: DeviceSort::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_sort(mut self, sort: DeviceSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }

    /// Normalized search terms; blank values do not constrain the listing
    fn name_term(&self) -> Option<String> {
        self.name.as_deref().map(normalize).filter(|s| !s.is_empty())
    }

    fn brand_term(&self) -> Option<String> {
        self.brand.as_deref().map(normalize).filter(|s| !s.is_empty())
    }

    fn push_predicate(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(name) = self.name_term() {
            query.push(" AND name = ");
            query.push_bind(name);
        }

        if let Some(brand) = self.brand_term() {
            query.push(" AND brand = ");
            query.push_bind(brand);
        }

        if let Some(state) = self.state {
            query.push(" AND state = ");
            query.push_bind(state.as_str());
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Device {
    pub id: DeviceId,
    pub display_name: String,
    pub display_brand: String,
    pub name: String,
    pub brand: String,
    #[sqlx(try_from = "String")]
    pub state: DeviceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<Device> for DeviceDBResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            display_name: device.display_name,
            display_brand: device.display_brand,
            name: device.name,
            brand: device.brand,
            state: device.state,
            created_at: device.created_at,
            updated_at: device.updated_at,
            deleted_at: device.deleted_at,
            version: device.version,
        }
    }
}

fn stale_version(id: DeviceId, expected_version: i64) -> DbError {
    DbError::StaleVersion {
        entity_type: "Device".to_string(),
        entity_id: id.to_string(),
        expected_version,
    }
}

pub struct Devices<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Devices<'c> {
    type CreateRequest = DeviceCreateDBRequest;
    type UpdateRequest = DeviceUpdateDBRequest;
    type Response = DeviceDBResponse;
    type Id = DeviceId;
    type Filter = DeviceFilter;

    #[instrument(skip(self, request), fields(display_name = %request.display_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let display_name = request.display_name.trim();
        let display_brand = request.display_brand.trim();

        // created_at and updated_at use database DEFAULT NOW(), version starts at 0
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (id, display_name, display_brand, name, brand, state)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(display_name)
        .bind(display_brand)
        .bind(normalize(display_name))
        .bind(normalize(display_brand))
        .bind(request.state.as_str())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(DeviceDBResponse::from(device))
    }

    #[instrument(skip(self), fields(device_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(device.map(DeviceDBResponse::from))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ANY($1) AND deleted_at IS NULL")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(devices.into_iter().map(|d| (d.id, DeviceDBResponse::from(d))).collect())
    }

    #[instrument(skip(self, filter), fields(page = filter.page, size = filter.size), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM devices WHERE deleted_at IS NULL");
        filter.push_predicate(&mut query);

        // Sort column comes from a closed enum, never from the request text
        let direction = filter.sort.direction.as_sql();
        query.push(format!(" ORDER BY {} {direction}, id {direction}", filter.sort.field.column()));
        query.push(" LIMIT ");
        query.push_bind(filter.size);
        query.push(" OFFSET ");
        query.push_bind(filter.offset());

        let devices = query.build_query_as::<Device>().fetch_all(&mut *self.db).await?;

        Ok(devices.into_iter().map(DeviceDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(device_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE devices SET deleted_at = NOW(), version = version + 1 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(device_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let current = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;

        if let Some(expected) = request.expected_version
            && expected != current.version
        {
            return Err(stale_version(id, expected));
        }

        let display_name = request.display_name.as_deref().map(str::trim).unwrap_or(&current.display_name);
        let display_brand = request.display_brand.as_deref().map(str::trim).unwrap_or(&current.display_brand);
        let state = request.state.unwrap_or(current.state);

        if display_name == current.display_name && display_brand == current.display_brand && state == current.state {
            // Nothing changed: keep version and updated_at as they are
            return Ok(current);
        }

        let device = sqlx::query_as::<_, Device>(
            r#"
            UPDATE devices SET
                display_name = $3,
                display_brand = $4,
                name = $5,
                brand = $6,
                state = $7,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(current.version)
        .bind(display_name)
        .bind(display_brand)
        .bind(normalize(display_name))
        .bind(normalize(display_brand))
        .bind(state.as_str())
        .fetch_optional(&mut *self.db)
        .await?;

        device.map(DeviceDBResponse::from).ok_or_else(|| stale_version(id, current.version))
    }
}

impl<'c> Devices<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count devices matching the filter, ignoring paging and sort
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &DeviceFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM devices WHERE deleted_at IS NULL");
        filter.push_predicate(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Soft delete a device only if it still carries `expected_version`.
    ///
    /// Returns `DbError::StaleVersion` when the row is live but was changed in the meantime,
    /// and `Ok(false)` when no live row exists.
    #[instrument(skip(self), fields(device_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_if_version(&mut self, id: DeviceId, expected_version: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE devices SET deleted_at = NOW(), version = version + 1 WHERE id = $1 AND version = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(expected_version)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.get_by_id(id).await? {
            Some(_) => Err(stale_version(id, expected_version)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn create_request(name: &str, brand: &str) -> DeviceCreateDBRequest {
        DeviceCreateDBRequest {
            display_name: name.to_string(),
            display_brand: brand.to_string(),
            state: DeviceState::Available,
        }
    }

    async fn seed(pool: &PgPool, devices: &[(&str, &str, DeviceState)]) -> Vec<DeviceDBResponse> {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);
        let mut created = Vec::new();
        for (name, brand, state) in devices {
            let request = DeviceCreateDBRequest {
                state: *state,
                ..create_request(name, brand)
            };
            created.push(repo.create(&request).await.unwrap());
        }
        created
    }

    #[test]
    fn test_sort_field_parses_api_property_names() {
        assert_eq!("createdAt".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("displayBrand".parse::<SortField>().unwrap(), SortField::DisplayBrand);
        assert!("created_at".parse::<SortField>().is_err());
        assert!("password".parse::<SortField>().is_err());
        for field in SortField::ALL {
            assert_eq!(field.to_string().parse::<SortField>().unwrap(), field);
        }
    }

    #[test]
    fn test_filter_offset_and_blank_terms() {
        let filter = DeviceFilter::new(3, 20).with_name("   ").with_brand(" Apple ");
        assert_eq!(filter.offset(), 60);
        assert_eq!(filter.name_term(), None);
        assert_eq!(filter.brand_term(), Some("apple".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_trims_and_normalizes(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        let device = repo.create(&create_request("  iPhone 14 Pro ", " Apple ")).await.unwrap();

        assert_eq!(device.display_name, "iPhone 14 Pro");
        assert_eq!(device.display_brand, "Apple");
        assert_eq!(device.name, "iphone 14 pro");
        assert_eq!(device.brand, "apple");
        assert_eq!(device.state, DeviceState::Available);
        assert_eq!(device.version, 0);
        assert_eq!(device.created_at, device.updated_at);
        assert!(device.deleted_at.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_id_missing_returns_none(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_bumps_version_and_renormalizes(pool: PgPool) {
        let created = seed(&pool, &[("Pixel 8", "Google", DeviceState::Available)]).await.remove(0);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);
        let request = DeviceUpdateDBRequest {
            display_name: Some(" Pixel 8 Pro ".to_string()),
            state: Some(DeviceState::InUse),
            ..Default::default()
        };
        let updated = repo.update(created.id, &request).await.unwrap();

        assert_eq!(updated.display_name, "Pixel 8 Pro");
        assert_eq!(updated.name, "pixel 8 pro");
        assert_eq!(updated.display_brand, "Google");
        assert_eq!(updated.state, DeviceState::InUse);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_noop_update_keeps_version(pool: PgPool) {
        let created = seed(&pool, &[("Pixel 8", "Google", DeviceState::Available)]).await.remove(0);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        let empty = repo.update(created.id, &DeviceUpdateDBRequest::default()).await.unwrap();
        assert_eq!(empty, created);

        let same_values = DeviceUpdateDBRequest {
            display_name: Some("Pixel 8 ".to_string()),
            display_brand: Some("Google".to_string()),
            state: Some(DeviceState::Available),
            ..Default::default()
        };
        let unchanged = repo.update(created.id, &same_values).await.unwrap();
        assert_eq!(unchanged.version, 0);
        assert_eq!(unchanged.updated_at, created.updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_with_stale_expected_version_fails(pool: PgPool) {
        let created = seed(&pool, &[("Pixel 8", "Google", DeviceState::Available)]).await.remove(0);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);
        let first = DeviceUpdateDBRequest {
            state: Some(DeviceState::Inactive),
            ..Default::default()
        };
        repo.update(created.id, &first.with_expected_version(0)).await.unwrap();

        let second = DeviceUpdateDBRequest {
            state: Some(DeviceState::InUse),
            ..Default::default()
        };
        let err = repo.update(created.id, &second.with_expected_version(0)).await.unwrap_err();
        assert!(matches!(err, DbError::StaleVersion { expected_version: 0, .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_missing_device_is_not_found(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        let err = repo.update(Uuid::new_v4(), &DeviceUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_soft_delete_hides_device(pool: PgPool) {
        let created = seed(&pool, &[("Pixel 8", "Google", DeviceState::Available)]).await.remove(0);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
        assert_eq!(repo.count(&DeviceFilter::new(0, 20)).await.unwrap(), 0);
        assert!(matches!(
            repo.update(created.id, &DeviceUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));

        // The row is kept with its deletion marker and a bumped version
        let (deleted_at, version): (Option<DateTime<Utc>>, i64) = sqlx::query_as("SELECT deleted_at, version FROM devices WHERE id = $1")
            .bind(created.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert!(deleted_at.is_some());
        assert_eq!(version, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_if_version(pool: PgPool) {
        let created = seed(&pool, &[("Pixel 8", "Google", DeviceState::Available)]).await.remove(0);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        let err = repo.delete_if_version(created.id, 5).await.unwrap_err();
        assert!(matches!(err, DbError::StaleVersion { .. }));

        assert!(repo.delete_if_version(created.id, 0).await.unwrap());
        assert!(!repo.delete_if_version(created.id, 1).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_on_normalized_values(pool: PgPool) {
        seed(
            &pool,
            &[
                ("iPhone 14 Pro", "Apple", DeviceState::Available),
                ("iPhone 15", "Apple", DeviceState::InUse),
                ("Galaxy S23", "Samsung", DeviceState::InUse),
            ],
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        let by_name = repo.list(&DeviceFilter::new(0, 20).with_name("IPHONE 14 pro")).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].display_name, "iPhone 14 Pro");

        let by_brand = DeviceFilter::new(0, 20).with_brand(" apple ");
        assert_eq!(repo.list(&by_brand).await.unwrap().len(), 2);
        assert_eq!(repo.count(&by_brand).await.unwrap(), 2);

        let by_brand_and_state = by_brand.with_state(DeviceState::InUse);
        let devices = repo.list(&by_brand_and_state).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].display_name, "iPhone 15");

        // Partial names are not matches
        assert!(repo.list(&DeviceFilter::new(0, 20).with_name("iphone")).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_pages_and_sorts(pool: PgPool) {
        seed(
            &pool,
            &[
                ("Charlie", "Acme", DeviceState::Available),
                ("alpha", "Acme", DeviceState::Available),
                ("Echo", "Acme", DeviceState::Available),
                ("Bravo", "Acme", DeviceState::Available),
                ("delta", "Acme", DeviceState::Available),
            ],
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);

        let by_name_asc = DeviceSort {
            field: SortField::Name,
            direction: SortDirection::Asc,
        };
        let first_page = repo.list(&DeviceFilter::new(0, 2).with_sort(by_name_asc)).await.unwrap();
        let names: Vec<_> = first_page.iter().map(|d| d.display_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Bravo"]);

        let last_page = repo.list(&DeviceFilter::new(2, 2).with_sort(by_name_asc)).await.unwrap();
        let names: Vec<_> = last_page.iter().map(|d| d.display_name.as_str()).collect();
        assert_eq!(names, vec!["Echo"]);

        let by_name_desc = DeviceSort {
            field: SortField::Name,
            direction: SortDirection::Desc,
        };
        let descending = repo.list(&DeviceFilter::new(0, 5).with_sort(by_name_desc)).await.unwrap();
        assert_eq!(descending[0].display_name, "Echo");
        assert_eq!(descending[4].display_name, "alpha");

        assert_eq!(repo.count(&DeviceFilter::new(0, 2)).await.unwrap(), 5);
        assert!(repo.list(&DeviceFilter::new(3, 2)).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_bulk_skips_missing_and_deleted(pool: PgPool) {
        let created = seed(
            &pool,
            &[
                ("Pixel 8", "Google", DeviceState::Available),
                ("Pixel 9", "Google", DeviceState::Available),
            ],
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Devices::new(&mut conn);
        repo.delete(created[1].id).await.unwrap();

        let found = repo.get_bulk(vec![created[0].id, created[1].id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&created[0].id].display_name, "Pixel 8");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_state_check_constraint(pool: PgPool) {
        let err = sqlx::query("INSERT INTO devices (id, display_name, display_brand, name, brand, state) VALUES ($1, 'a', 'b', 'a', 'b', 'BROKEN')")
            .bind(Uuid::new_v4())
            .execute(&pool)
            .await
            .unwrap_err();

        assert!(matches!(DbError::from(err), DbError::CheckViolation { .. }));
    }
}
