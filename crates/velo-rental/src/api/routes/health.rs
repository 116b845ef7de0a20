use axum::{extract::State, http::StatusCode, Json};
use tracing::warn;

use crate::api::types::HealthResponse;
use crate::server::AppState;

pub const SERVICE_NAME: &str = "velo-rental";

/// Liveness plus a database round trip
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status_code, status, database) = match state.health.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected".to_string()),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "unhealthy",
                "unreachable".to_string(),
            )
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
        }),
    )
}
