//! Health check endpoint.

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
