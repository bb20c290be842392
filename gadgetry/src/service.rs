//! Device business operations.
//!
//! [`DeviceService`] sits between the HTTP handlers and the [`Devices`] repository. Each
//! operation runs in its own transaction and enforces the in-use protection rules:
//! a device whose persisted state is `IN_USE` cannot be renamed, rebranded or deleted.
//! Updates and deletes are pinned to the version that was checked, so a concurrent
//! change between the check and the write surfaces as a conflict instead of slipping
//! past the guard.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use crate::api::models::devices::{DeviceCreate, DeviceUpdate};
use crate::db::handlers::{Devices, Repository, devices::DeviceFilter};
use crate::db::models::devices::{DeviceCreateDBRequest, DeviceDBResponse, DeviceUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{DeviceId, abbrev_uuid};

pub const DEVICE_IN_USE_NAME: &str = "Cannot update name of device in use";
pub const DEVICE_IN_USE_BRAND: &str = "Cannot update brand of device in use";
pub const DEVICE_IN_USE_DELETE: &str = "Cannot delete device in use";

fn device_not_found(id: DeviceId) -> Error {
    Error::NotFound {
        resource: "Device".to_string(),
        id: id.to_string(),
    }
}

/// Reject name or brand changes on a device that is currently in use.
///
/// Only values that actually differ from the stored ones count as changes, and the
/// check uses the stored state rather than any state carried by the patch.
pub fn check_update_allowed(current: &DeviceDBResponse, update: &DeviceUpdate) -> Result<()> {
    if !current.is_in_use() {
        return Ok(());
    }

    if let Some(name) = &update.display_name
        && name.trim() != current.display_name
    {
        return Err(Error::Conflict {
            message: DEVICE_IN_USE_NAME.to_string(),
        });
    }

    if let Some(brand) = &update.display_brand
        && brand.trim() != current.display_brand
    {
        return Err(Error::Conflict {
            message: DEVICE_IN_USE_BRAND.to_string(),
        });
    }

    Ok(())
}

#[derive(Clone)]
pub struct DeviceService {
    db: PgPool,
}

impl DeviceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Transaction whose statements all read the same snapshot, so a page and its total agree
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Ok(tx)
    }

    #[instrument(skip_all, err)]
    pub async fn create(&self, request: DeviceCreate) -> Result<DeviceDBResponse> {
        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        let device = Devices::new(&mut tx).create(&DeviceCreateDBRequest::from(request)).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        Ok(device)
    }

    #[instrument(skip(self), fields(device_id = %abbrev_uuid(&id)), err)]
    pub async fn find_by_id(&self, id: DeviceId) -> Result<DeviceDBResponse> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Devices::new(&mut conn).get_by_id(id).await?.ok_or_else(|| device_not_found(id))
    }

    /// One page of devices matching the filter, plus the total across all pages
    #[instrument(skip_all, fields(page = filter.page, size = filter.size), err)]
    pub async fn search(&self, filter: &DeviceFilter) -> Result<(Vec<DeviceDBResponse>, i64)> {
        let mut tx = self.begin_snapshot().await?;
        let mut repo = Devices::new(&mut tx);
        let devices = repo.list(filter).await?;
        let total = repo.count(filter).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        Ok((devices, total))
    }

    #[instrument(skip(self, update), fields(device_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&self, id: DeviceId, update: DeviceUpdate) -> Result<DeviceDBResponse> {
        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Devices::new(&mut tx);

        let current = repo.get_by_id(id).await?.ok_or_else(|| device_not_found(id))?;
        check_update_allowed(&current, &update)?;

        let request = DeviceUpdateDBRequest::new(update).with_expected_version(current.version);
        let device = repo.update(id, &request).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        Ok(device)
    }

    #[instrument(skip(self), fields(device_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&self, id: DeviceId) -> Result<()> {
        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Devices::new(&mut tx);

        let current = repo.get_by_id(id).await?.ok_or_else(|| device_not_found(id))?;
        if current.is_in_use() {
            return Err(Error::Conflict {
                message: DEVICE_IN_USE_DELETE.to_string(),
            });
        }

        if !repo.delete_if_version(id, current.version).await? {
            return Err(device_not_found(id));
        }
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::types::DeviceState;
    use chrono::Utc;
    use uuid::Uuid;

    fn device(state: DeviceState) -> DeviceDBResponse {
        let now = Utc::now();
        DeviceDBResponse {
            id: Uuid::new_v4(),
            display_name: "iPhone 14 Pro".to_string(),
            display_brand: "Apple".to_string(),
            name: "iphone 14 pro".to_string(),
            brand: "apple".to_string(),
            state,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        }
    }

    fn create(name: &str, brand: &str, state: Option<DeviceState>) -> DeviceCreate {
        DeviceCreate {
            display_name: Some(name.to_string()),
            display_brand: Some(brand.to_string()),
            state,
        }
    }

    #[test]
    fn test_guard_allows_anything_when_not_in_use() {
        let update = DeviceUpdate {
            display_name: Some("Other".to_string()),
            display_brand: Some("Other".to_string()),
            state: Some(DeviceState::InUse),
        };
        assert!(check_update_allowed(&device(DeviceState::Available), &update).is_ok());
        assert!(check_update_allowed(&device(DeviceState::Inactive), &update).is_ok());
    }

    #[test]
    fn test_guard_blocks_name_and_brand_changes_in_use() {
        let current = device(DeviceState::InUse);

        let rename = DeviceUpdate {
            display_name: Some("iPhone 15".to_string()),
            ..Default::default()
        };
        let err = check_update_allowed(&current, &rename).unwrap_err();
        assert_eq!(err.to_string(), DEVICE_IN_USE_NAME);

        let rebrand = DeviceUpdate {
            display_brand: Some("Samsung".to_string()),
            ..Default::default()
        };
        let err = check_update_allowed(&current, &rebrand).unwrap_err();
        assert_eq!(err.to_string(), DEVICE_IN_USE_BRAND);
    }

    #[test]
    fn test_guard_uses_persisted_state_and_ignores_unchanged_values() {
        let current = device(DeviceState::InUse);

        // Releasing the device in the same request does not unlock the rename
        let release_and_rename = DeviceUpdate {
            display_name: Some("iPhone 15".to_string()),
            state: Some(DeviceState::Available),
            ..Default::default()
        };
        assert!(check_update_allowed(&current, &release_and_rename).is_err());

        let same_values = DeviceUpdate {
            display_name: Some("iPhone 14 Pro".to_string()),
            display_brand: Some("Apple".to_string()),
            state: Some(DeviceState::Inactive),
        };
        assert!(check_update_allowed(&current, &same_values).is_ok());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_defaults_to_available(pool: PgPool) {
        let service = DeviceService::new(pool);

        let device = service.create(create("Pixel 8", "Google", None)).await.unwrap();
        assert_eq!(device.state, DeviceState::Available);
        assert_eq!(device.version, 0);

        let in_use = service.create(create("Pixel 9", "Google", Some(DeviceState::InUse))).await.unwrap();
        assert_eq!(in_use.state, DeviceState::InUse);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_find_by_id_not_found(pool: PgPool) {
        let service = DeviceService::new(pool);
        let id = Uuid::new_v4();

        let err = service.find_by_id(id).await.unwrap_err();
        assert!(matches!(&err, Error::NotFound { resource, .. } if resource == "Device"));
        assert_eq!(err.to_string(), format!("Device not found with id: {id}"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_in_use_device(pool: PgPool) {
        let service = DeviceService::new(pool);
        let device = service.create(create("Pixel 8", "Google", Some(DeviceState::InUse))).await.unwrap();

        let rename = DeviceUpdate {
            display_name: Some("Pixel 8a".to_string()),
            ..Default::default()
        };
        assert!(matches!(service.update(device.id, rename).await, Err(Error::Conflict { .. })));

        // State changes are still allowed
        let release = DeviceUpdate {
            state: Some(DeviceState::Available),
            ..Default::default()
        };
        let released = service.update(device.id, release).await.unwrap();
        assert_eq!(released.state, DeviceState::Available);
        assert_eq!(released.version, 1);

        let rename = DeviceUpdate {
            display_name: Some("Pixel 8a".to_string()),
            ..Default::default()
        };
        let renamed = service.update(device.id, rename).await.unwrap();
        assert_eq!(renamed.display_name, "Pixel 8a");
        assert_eq!(renamed.version, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_rules(pool: PgPool) {
        let service = DeviceService::new(pool);
        let in_use = service.create(create("Pixel 8", "Google", Some(DeviceState::InUse))).await.unwrap();
        let available = service.create(create("Pixel 9", "Google", None)).await.unwrap();

        let err = service.delete(in_use.id).await.unwrap_err();
        assert_eq!(err.to_string(), DEVICE_IN_USE_DELETE);
        assert!(service.find_by_id(in_use.id).await.is_ok());

        service.delete(available.id).await.unwrap();
        assert!(matches!(service.find_by_id(available.id).await, Err(Error::NotFound { .. })));
        assert!(matches!(service.delete(available.id).await, Err(Error::NotFound { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_returns_total(pool: PgPool) {
        let service = DeviceService::new(pool);
        for n in 0..5 {
            service.create(create(&format!("Device {n}"), "Acme", None)).await.unwrap();
        }
        service.create(create("Other", "Globex", None)).await.unwrap();

        let (devices, total) = service.search(&DeviceFilter::new(0, 2).with_brand("ACME")).await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(total, 5);

        let (all, total) = service.search(&DeviceFilter::new(0, 20)).await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(total, 6);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_reads_one_snapshot(pool: PgPool) {
        let service = DeviceService::new(pool);
        let mut tx = service.begin_snapshot().await.unwrap();

        let isolation: String = sqlx::query_scalar("SHOW transaction_isolation").fetch_one(&mut *tx).await.unwrap();
        assert_eq!(isolation, "repeatable read");
        let read_only: String = sqlx::query_scalar("SHOW transaction_read_only").fetch_one(&mut *tx).await.unwrap();
        assert_eq!(read_only, "on");

        tx.commit().await.unwrap();
    }

    #[test]
    fn test_stale_version_surfaces_as_conflict() {
        let err = Error::from(DbError::StaleVersion {
            entity_type: "Device".to_string(),
            entity_id: "x".to_string(),
            expected_version: 0,
        });
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }
}
