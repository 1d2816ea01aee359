//! Liveness check.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        service: "egaldeutsch".into(),
    })
}
