use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

use crate::engine::RecordingEngine;
use crate::models::{ReplayResult, StepReport};

/// WebSocket event types broadcast to clients
#[derive(Debug, Clone)]
pub enum WsEvent {
    ReplayStep {
        replay_id: String,
        report: StepReport,
    },
    ReplayComplete {
        replay_id: String,
        result: ReplayResult,
    },
    Error {
        replay_id: String,
        error: String,
    },
    Pong,
}

/// How long a finished replay stays queryable
pub const FINISHED_REPLAY_RETENTION: Duration = Duration::from_secs(30 * 60);

/// Connected WebSocket client info
#[derive(Debug)]
pub struct ConnectedClient {
    pub connected_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ReplayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplayStatus::Running => "running",
            ReplayStatus::Completed => "completed",
            ReplayStatus::Cancelled => "cancelled",
            ReplayStatus::Failed => "failed",
        }
    }
}

/// A replay started over HTTP. Kept after it finishes so its result can be fetched.
pub struct ActiveReplay {
    pub cancel_tx: watch::Sender<bool>,
    pub status: ReplayStatus,
    pub result: Option<ReplayResult>,
    pub error: Option<String>,
    pub finished_at: Option<Instant>,
}

impl ActiveReplay {
    pub fn new(cancel_tx: watch::Sender<bool>) -> Self {
        Self {
            cancel_tx,
            status: ReplayStatus::Running,
            result: None,
            error: None,
            finished_at: None,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub engine: Arc<RecordingEngine>,

    /// Replays: replay_id -> progress and outcome
    pub replays: DashMap<String, ActiveReplay>,

    /// Connected WebSocket clients: client_id -> client info
    pub connected_clients: DashMap<String, ConnectedClient>,

    /// Total connection count (for metrics)
    connection_count: AtomicUsize,

    /// Broadcast channel for WebSocket events
    pub ws_broadcast: broadcast::Sender<WsEvent>,
}

impl AppState {
    pub fn new(engine: Arc<RecordingEngine>) -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            engine,
            replays: DashMap::new(),
            connected_clients: DashMap::new(),
            connection_count: AtomicUsize::new(0),
            ws_broadcast: tx,
        }
    }

    /// Broadcast an event to all connected WebSocket clients
    pub fn broadcast(&self, event: WsEvent) {
        let _ = self.ws_broadcast.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.ws_broadcast.subscribe()
    }

    pub fn client_connected(&self, client_id: &str) {
        self.connected_clients.insert(
            client_id.to_string(),
            ConnectedClient {
                connected_at: Instant::now(),
            },
        );
        let total = self.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            "Client {} connected (active: {}, total: {})",
            client_id,
            self.connected_clients.len(),
            total
        );
    }

    pub fn client_disconnected(&self, client_id: &str) {
        if let Some((_, client)) = self.connected_clients.remove(client_id) {
            tracing::debug!(
                "Client {} disconnected after {:?} (active: {})",
                client_id,
                client.connected_at.elapsed(),
                self.connected_clients.len()
            );
        }
    }

    pub fn active_connection_count(&self) -> usize {
        self.connected_clients.len()
    }

    /// Record the outcome of a finished replay.
    pub fn finish_replay(&self, replay_id: &str, outcome: Result<ReplayResult, String>) {
        let Some(mut replay) = self.replays.get_mut(replay_id) else {
            return;
        };
        replay.finished_at = Some(Instant::now());
        match outcome {
            Ok(result) => {
                replay.status = if result.cancelled {
                    ReplayStatus::Cancelled
                } else {
                    ReplayStatus::Completed
                };
                replay.result = Some(result);
            }
            Err(error) => {
                replay.status = ReplayStatus::Failed;
                replay.error = Some(error);
            }
        }
    }

    /// Drop replays that finished more than `retention` ago. Running replays stay.
    pub fn prune_finished_replays(&self, retention: Duration) {
        let before = self.replays.len();
        self.replays.retain(|_, replay| {
            replay
                .finished_at
                .map_or(true, |finished| finished.elapsed() < retention)
        });
        let pruned = before - self.replays.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} finished replays", pruned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeLauncher, FakeSession};
    use crate::config::Config;

    fn state() -> AppState {
        let engine = RecordingEngine::new(
            Config::default(),
            Arc::new(FakeLauncher::new(FakeSession::new("about:blank"))),
        );
        AppState::new(Arc::new(engine))
    }

    #[test]
    fn test_client_tracking() {
        let state = state();
        state.client_connected("a");
        state.client_connected("b");
        assert_eq!(state.active_connection_count(), 2);
        state.client_disconnected("a");
        state.client_disconnected("unknown");
        assert_eq!(state.active_connection_count(), 1);
    }

    #[test]
    fn test_failed_replay_keeps_error() {
        let state = state();
        let (tx, _rx) = watch::channel(false);
        state.replays.insert("r1".to_string(), ActiveReplay::new(tx));

        state.finish_replay("r1", Err("Failed to start browser session: boom".to_string()));
        let replay = state.replays.get("r1").unwrap();
        assert_eq!(replay.status, ReplayStatus::Failed);
        assert!(replay.error.as_deref().unwrap().contains("boom"));
        assert!(replay.result.is_none());
        assert!(replay.finished_at.is_some());
    }

    #[test]
    fn test_prune_drops_only_finished_replays() {
        let state = state();
        let (running_tx, _running_rx) = watch::channel(false);
        let (done_tx, _done_rx) = watch::channel(false);
        state.replays.insert("running".to_string(), ActiveReplay::new(running_tx));
        state.replays.insert("done".to_string(), ActiveReplay::new(done_tx));
        state.finish_replay("done", Err("boom".to_string()));

        state.prune_finished_replays(FINISHED_REPLAY_RETENTION);
        assert_eq!(state.replays.len(), 2);

        state.prune_finished_replays(Duration::ZERO);
        assert!(state.replays.contains_key("running"));
        assert!(!state.replays.contains_key("done"));
    }
}
