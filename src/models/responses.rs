use serde::Serialize;

use super::recording::{ActionRecord, RecordingId, RecordingSummary};
use super::replay::ReplayResult;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub capture_id: String,
    pub platform: String,
    pub start_url: String,
    pub status: String,
    /// False when only navigations are being recorded
    pub instrumented: bool,
}

/// Result of stopping a capture. `recording_id` is absent when nothing was captured.
#[derive(Debug, Serialize)]
pub struct StopCaptureResponse {
    pub capture_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<RecordingId>,
    pub total_actions: usize,
}

#[derive(Debug, Serialize)]
pub struct CaptureStatusResponse {
    pub capture_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ManualActionResponse {
    pub capture_id: String,
    pub recorded: Option<ActionRecord>,
    pub total_actions: usize,
}

#[derive(Debug, Serialize)]
pub struct ListRecordingsResponse {
    pub platform: String,
    pub recordings: Vec<RecordingSummary>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub recording_id: RecordingId,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct StartReplayResponse {
    pub replay_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ReplayStatusResponse {
    pub replay_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReplayResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
