use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ManualActionResponse, StartCaptureRequest, StartCaptureResponse, StopCaptureResponse};

use super::super::state::AppState;
use super::capture::{resolve_target_url, stop_response};

/// Open a session for operator-driven recording
pub async fn start_manual(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartCaptureRequest>,
) -> Result<Json<StartCaptureResponse>> {
    let target_url = resolve_target_url(&request)?;

    let info = state
        .engine
        .start_manual(&request.platform, &target_url, request.headless)
        .await?;

    Ok(Json(StartCaptureResponse {
        capture_id: info.capture_id,
        platform: info.platform,
        start_url: info.start_url,
        status: "recording".to_string(),
        instrumented: info.instrumented,
    }))
}

/// Snapshot the current page
pub async fn record_state(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<ManualActionResponse>> {
    let (record, total_actions) = state.engine.manual_record_state(&capture_id).await?;
    Ok(Json(ManualActionResponse {
        capture_id,
        recorded: Some(record),
        total_actions,
    }))
}

/// Record the current URL; `recorded` is null when it did not change
pub async fn record_navigation(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<ManualActionResponse>> {
    let (recorded, total_actions) = state.engine.manual_record_navigation(&capture_id).await?;
    Ok(Json(ManualActionResponse {
        capture_id,
        recorded,
        total_actions,
    }))
}

pub async fn stop_manual(
    State(state): State<Arc<AppState>>,
    Path(capture_id): Path<String>,
) -> Result<Json<StopCaptureResponse>> {
    let outcome = state.engine.stop_manual(&capture_id).await?;
    Ok(Json(stop_response(capture_id, outcome)))
}
