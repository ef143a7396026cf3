use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{capture, health, manual, recordings, replay};
use super::state::AppState;
use super::websocket::ws_handler;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Operator UI runs locally; nothing else may call the engine
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
            HeaderValue::from_static("http://localhost:8765"),
            HeaderValue::from_static("http://127.0.0.1:8765"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/platforms", get(health::list_platforms))
        // Automatic capture
        .route("/capture/start", post(capture::start_capture))
        .route("/capture/:capture_id/stop", post(capture::stop_capture))
        .route("/capture/:capture_id/pause", post(capture::pause_capture))
        .route("/capture/:capture_id/resume", post(capture::resume_capture))
        .route("/capture/:capture_id/cancel", post(capture::cancel_capture))
        // Manual capture
        .route("/manual/start", post(manual::start_manual))
        .route("/manual/:capture_id/state", post(manual::record_state))
        .route("/manual/:capture_id/nav", post(manual::record_navigation))
        .route("/manual/:capture_id/stop", post(manual::stop_manual))
        // Stored recordings
        .route("/recordings", get(recordings::list_recordings))
        .route("/recordings/:recording_id", get(recordings::get_recording))
        .route(
            "/recordings/:recording_id/preview",
            get(recordings::preview_recording),
        )
        // Replay endpoints
        .route("/replay/start", post(replay::start_replay))
        .route("/replay/:replay_id/stop", post(replay::stop_replay))
        .route("/replay/:replay_id/status", get(replay::get_replay_status))
        // WebSocket
        .route("/ws/:client_id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
