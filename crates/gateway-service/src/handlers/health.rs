//! Liveness and readiness probes.
//!
//! - `/health`: process is up; checks nothing
//! - `/ready`: the user store answers its health probe

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 when the user store is reachable, 503 otherwise. The
/// underlying error is logged, not returned.
#[tracing::instrument(skip_all, name = "gateway.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.users.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                user_store: "healthy",
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "gateway.health", error = %e, "Readiness check failed: user store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    user_store: "unhealthy",
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }
}
