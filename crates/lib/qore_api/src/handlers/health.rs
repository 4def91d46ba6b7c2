//! Liveness probe.

use axum::Json;
use serde::Serialize;

use crate::models::ApiResponse;

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub version: &'static str,
}

/// `GET /health`
pub async fn health_handler() -> Json<ApiResponse<HealthData>> {
    Json(ApiResponse::ok(
        "Server is running",
        HealthData {
            version: qore_core::version(),
        },
    ))
}
