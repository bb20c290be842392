use crate::AppState;
use crate::api::extractors::{ApiPath, ApiQuery, ValidatedJson};
use crate::api::models::devices::{DeviceCreate, DeviceResponse, DeviceUpdate, ListDevicesQuery};
use crate::api::models::pagination::Page;
use crate::errors::{ProblemDetail, Result};
use crate::service::DeviceService;
use crate::types::DeviceId;
use axum::{Json, extract::State, http::StatusCode};

#[utoipa::path(
    post,
    path = "/devices",
    tag = "devices",
    summary = "Create device",
    request_body = DeviceCreate,
    responses(
        (status = 201, description = "Device created", body = DeviceResponse),
        (status = 400, description = "Invalid request", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 500, description = "Internal server error", body = ProblemDetail, content_type = "application/problem+json")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_device(
    State(state): State<AppState>,
    ValidatedJson(create): ValidatedJson<DeviceCreate>,
) -> Result<(StatusCode, Json<DeviceResponse>)> {
    let device = DeviceService::new(state.db).create(create).await?;
    Ok((StatusCode::CREATED, Json(DeviceResponse::from(device))))
}

#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = "devices",
    summary = "Get device",
    params(
        ("id" = uuid::Uuid, Path, description = "Device ID"),
    ),
    responses(
        (status = 200, description = "Device details", body = DeviceResponse),
        (status = 400, description = "Malformed device ID", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 404, description = "Device not found", body = ProblemDetail, content_type = "application/problem+json")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_device(State(state): State<AppState>, ApiPath(id): ApiPath<DeviceId>) -> Result<Json<DeviceResponse>> {
    let device = DeviceService::new(state.db).find_by_id(id).await?;
    Ok(Json(DeviceResponse::from(device)))
}

#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    summary = "List devices",
    description = "Filter by name, brand and state; page and sort the results. Name and brand match whole values, ignoring case and surrounding whitespace.",
    params(ListDevicesQuery),
    responses(
        (status = 200, description = "Page of devices", body = Page<DeviceResponse>),
        (status = 400, description = "Invalid paging, sort or filter parameters", body = ProblemDetail, content_type = "application/problem+json")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_devices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListDevicesQuery>,
) -> Result<Json<Page<DeviceResponse>>> {
    let filter = query.to_filter(&state.config.pagination)?;
    let (devices, total) = DeviceService::new(state.db).search(&filter).await?;

    let page = Page::new(devices, filter.page, filter.size, total).map(DeviceResponse::from);
    Ok(Json(page))
}

#[utoipa::path(
    patch,
    path = "/devices/{id}",
    tag = "devices",
    summary = "Update device",
    description = "Partial update. Devices in use cannot change name or brand.",
    request_body = DeviceUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Device ID"),
    ),
    responses(
        (status = 200, description = "Device updated", body = DeviceResponse),
        (status = 400, description = "Invalid request", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 404, description = "Device not found", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 409, description = "Device in use or modified concurrently", body = ProblemDetail, content_type = "application/problem+json")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_device(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    ValidatedJson(update): ValidatedJson<DeviceUpdate>,
) -> Result<Json<DeviceResponse>> {
    let device = DeviceService::new(state.db).update(id, update).await?;
    Ok(Json(DeviceResponse::from(device)))
}

#[utoipa::path(
    delete,
    path = "/devices/{id}",
    tag = "devices",
    summary = "Delete device",
    params(
        ("id" = uuid::Uuid, Path, description = "Device ID"),
    ),
    responses(
        (status = 204, description = "Device deleted"),
        (status = 404, description = "Device not found", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 409, description = "Device in use", body = ProblemDetail, content_type = "application/problem+json")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_device(State(state): State<AppState>, ApiPath(id): ApiPath<DeviceId>) -> Result<StatusCode> {
    DeviceService::new(state.db).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
