//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//! - **[`extractors`]**: Path, query and body extractors that fail with problem details
//!
//! # API Structure
//!
//! - **Devices** (`/api/devices/*`): Device inventory CRUD, filtering and paging
//! - **Health** (`/healthz`, `/readyz`): Liveness and readiness probes
//!
//! # OpenAPI Documentation
//!
//! Endpoints are documented with `utoipa` annotations. The OpenAPI document is served at
//! `/api-docs/openapi.json` and an interactive reference at `/docs`.

pub mod extractors;
pub mod handlers;
pub mod models;
