use crate::AppState;
use axum::{extract::State, http::StatusCode};
use tracing::warn;

/// Liveness probe; answers as long as the process is serving requests
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    summary = "Liveness probe",
    responses(
        (status = 200, description = "Process is up", body = String, content_type = "text/plain")
    )
)]
pub async fn healthz() -> &'static str {
    "OK"
}

/// Readiness probe; checks that the database answers a trivial query
#[utoipa::path(
    get,
    path = "/readyz",
    tag = "health",
    summary = "Readiness probe",
    responses(
        (status = 200, description = "Ready to serve traffic", body = String, content_type = "text/plain"),
        (status = 503, description = "Database unavailable", body = String, content_type = "text/plain")
    )
)]
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
