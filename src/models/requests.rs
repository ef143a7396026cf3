use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct StartCaptureRequest {
    pub platform: String,
    /// Defaults to the platform preset URL when omitted
    pub target_url: Option<String>,
    #[serde(default)]
    pub headless: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListRecordingsQuery {
    pub platform: String,
}

/// Run data values may be any JSON scalar; they are rendered to text.
#[derive(Debug, Deserialize)]
pub struct StartReplayRequest {
    pub recording_id: String,
    #[serde(default)]
    pub run_data: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub headless: bool,
}
