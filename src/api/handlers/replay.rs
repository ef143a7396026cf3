use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{RecordingId, ReplayStatusResponse, RunData, StartReplayRequest, StartReplayResponse};

use super::super::state::{ActiveReplay, AppState, WsEvent, FINISHED_REPLAY_RETENTION};

/// Start replaying a stored recording with the given run data.
///
/// Returns as soon as the recording is loaded; step reports and the final
/// result are pushed over the WebSocket and kept for `get_replay_status`.
pub async fn start_replay(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartReplayRequest>,
) -> Result<Json<StartReplayResponse>> {
    let recording_id = RecordingId::new(request.recording_id);
    let recording = state.engine.load_recording(&recording_id)?;
    let data = RunData::from_json(request.run_data);

    state.prune_finished_replays(FINISHED_REPLAY_RETENTION);

    let replay_id = Uuid::new_v4().to_string();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    state
        .replays
        .insert(replay_id.clone(), ActiveReplay::new(cancel_tx));

    let runner = state.engine.replay_runner();
    let mut report_rx = runner.subscribe();

    // Forward step reports to WebSocket
    let ws_broadcast = state.ws_broadcast.clone();
    let rid = replay_id.clone();
    let forwarder = tokio::spawn(async move {
        while let Ok(report) = report_rx.recv().await {
            let _ = ws_broadcast.send(WsEvent::ReplayStep {
                replay_id: rid.clone(),
                report,
            });
        }
    });

    let state_clone = Arc::clone(&state);
    let rid = replay_id.clone();
    let headless = request.headless;
    tokio::spawn(async move {
        let outcome = runner
            .replay(&recording, Some(recording_id), &data, headless, cancel_rx)
            .await;
        // Closing the report channel lets the forwarder drain and exit
        drop(runner);
        let _ = forwarder.await;

        match outcome {
            Ok(result) => {
                state_clone.broadcast(WsEvent::ReplayComplete {
                    replay_id: rid.clone(),
                    result: result.clone(),
                });
                state_clone.finish_replay(&rid, Ok(result));
            }
            Err(e) => {
                tracing::error!("Replay {} failed: {}", rid, e);
                state_clone.broadcast(WsEvent::Error {
                    replay_id: rid.clone(),
                    error: e.to_string(),
                });
                state_clone.finish_replay(&rid, Err(e.to_string()));
            }
        }
    });

    tracing::info!("Started replay {}", replay_id);

    Ok(Json(StartReplayResponse {
        replay_id,
        status: "running".to_string(),
    }))
}

/// Ask a running replay to stop before its next step
pub async fn stop_replay(
    State(state): State<Arc<AppState>>,
    Path(replay_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let replay = state
        .replays
        .get(&replay_id)
        .ok_or_else(|| AppError::ReplayNotFound(replay_id.clone()))?;

    replay.cancel_tx.send_replace(true);
    tracing::info!("Stop requested for replay {}", replay_id);

    Ok(Json(serde_json::json!({ "status": "stopping" })))
}

pub async fn get_replay_status(
    State(state): State<Arc<AppState>>,
    Path(replay_id): Path<String>,
) -> Result<Json<ReplayStatusResponse>> {
    let replay = state
        .replays
        .get(&replay_id)
        .ok_or_else(|| AppError::ReplayNotFound(replay_id.clone()))?;

    Ok(Json(ReplayStatusResponse {
        replay_id: replay_id.clone(),
        status: replay.status.as_str().to_string(),
        result: replay.result.clone(),
        error: replay.error.clone(),
    }))
}
