use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ListRecordingsQuery, ListRecordingsResponse, PreviewResponse, Recording, RecordingId};

use super::super::state::AppState;

/// Recordings for one platform, newest first
pub async fn list_recordings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRecordingsQuery>,
) -> Result<Json<ListRecordingsResponse>> {
    let recordings = state.engine.list_recordings(&query.platform)?;
    Ok(Json(ListRecordingsResponse {
        platform: query.platform,
        recordings,
    }))
}

pub async fn get_recording(
    State(state): State<Arc<AppState>>,
    Path(recording_id): Path<String>,
) -> Result<Json<Recording>> {
    let recording = state.engine.load_recording(&RecordingId::new(recording_id))?;
    Ok(Json(recording))
}

pub async fn preview_recording(
    State(state): State<Arc<AppState>>,
    Path(recording_id): Path<String>,
) -> Result<Json<PreviewResponse>> {
    let recording_id = RecordingId::new(recording_id);
    let preview = state.engine.preview(&recording_id)?;
    Ok(Json(PreviewResponse {
        recording_id,
        preview,
    }))
}
