use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::config::platform_preset;
use crate::error::{AppError, Result};
use crate::models::{CaptureStatusResponse, StartCaptureRequest, StartCaptureResponse, StopCaptureResponse};
use crate::recording::CaptureOutcome;

use super::super::state::AppState;

/// Use the request's URL, falling back to the platform preset.
pub(crate) fn resolve_target_url(request: &StartCaptureRequest) -> Result<String> {
    if request.platform.trim().is_empty() {
        return Err(AppError::ValidationError("platform is required".to_string()));
    }

    match request.target_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(url.to_string()),
        _ => platform_preset(&request.platform)
            .map(|preset| preset.url.to_string())
            .ok_or_else(|| {
                AppError::ValidationError(format!(
                    "No target_url given and '{}' has no preset URL",
                    request.platform
                ))
            }),
    }
}

pub(crate) fn stop_response(capture_id: String, outcome: CaptureOutcome) -> StopCaptureResponse {
    match outcome {
        CaptureOutcome::Saved { id, recording } => StopCaptureResponse {
            capture_id,
            status: "saved".to_string(),
            recording_id: Some(id),
            total_actions: recording.total_actions(),
        },
        CaptureOutcome::Unsaved { recording, .. } => StopCaptureResponse {
            capture_id,
            status: "unsaved".to_string(),
            recording_id: None,
            total_actions: recording.total_actions(),
        },
        CaptureOutcome::NothingCaptured => StopCaptureResponse {
            capture_id,
            status: "empty".to_string(),
            recording_id: None,
            total_actions: 0,
        },
    }
}

/// Open a browser session and start capturing interactions
pub async fn start_capture(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartCaptureRequest>,
) -> Result<Json<StartCaptureResponse>> {
    let target_url = resolve_target_url(&request)?;

    let info = state
        .engine
        .start_capture(&request.platform, &target_url, request.headless)
        .await?;

    Ok(Json(StartCaptureResponse {
        capture_id: info.capture_id,
        platform: info.platform,
        start_url: info.start_url,
        status: "recording".to_string(),
        instrumented: info.instrumented,
    }))
}

/// Stop a capture and persist what it recorded
pub async fn stop_capture(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<StopCaptureResponse>> {
    let outcome = state.engine.stop_capture(&capture_id).await?;
    Ok(Json(stop_response(capture_id, outcome)))
}

pub async fn pause_capture(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<CaptureStatusResponse>> {
    state.engine.pause_capture(&capture_id).await?;
    Ok(Json(CaptureStatusResponse {
        capture_id,
        status: "paused".to_string(),
    }))
}

pub async fn resume_capture(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<CaptureStatusResponse>> {
    state.engine.resume_capture(&capture_id).await?;
    Ok(Json(CaptureStatusResponse {
        capture_id,
        status: "recording".to_string(),
    }))
}

/// Discard a capture without saving
pub async fn cancel_capture(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<CaptureStatusResponse>> {
    state.engine.cancel_capture(&capture_id).await?;
    Ok(Json(CaptureStatusResponse {
        capture_id,
        status: "cancelled".to_string(),
    }))
}
