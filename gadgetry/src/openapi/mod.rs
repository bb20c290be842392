//! OpenAPI documentation for the device inventory API.
//!
//! [`ApiDoc`] covers the `/api/*` device endpoints; the health probes are documented
//! separately in [`ProbesApiDoc`] since they live at the server root.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::devices::DeviceResponse;
use crate::api::models::pagination::Page;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gadgetry API",
        description = "Device inventory: register devices, track whether they are in use, and page through the catalogue.",
    ),
    servers(
        (url = "/api", description = "Device inventory API")
    ),
    paths(
        api::handlers::devices::create_device,
        api::handlers::devices::get_device,
        api::handlers::devices::list_devices,
        api::handlers::devices::update_device,
        api::handlers::devices::delete_device,
    ),
    components(
        schemas(
            api::models::devices::DeviceCreate,
            api::models::devices::DeviceUpdate,
            api::models::devices::DeviceResponse,
            crate::types::DeviceState,
            crate::errors::ProblemDetail,
            api::models::pagination::Pageable,
            api::models::pagination::SortInfo,
            Page<DeviceResponse>,
        )
    ),
    tags(
        (name = "devices", description = "Device inventory management"),
    )
)]
pub struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(api::handlers::health::healthz, api::handlers::health::readyz),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
    )
)]
pub struct ProbesApiDoc;
