use axum::Json;
use chrono::Utc;

use crate::config::{PlatformPreset, PLATFORM_PRESETS};
use crate::models::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Known partner extranets and their entry URLs
pub async fn list_platforms() -> Json<&'static [PlatformPreset]> {
    Json(PLATFORM_PRESETS)
}
