use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::{AppState, WsEvent};

#[derive(Debug, Deserialize)]
struct WsIncoming {
    #[serde(rename = "type")]
    msg_type: String,
}

#[derive(Debug, Serialize)]
struct WsOutgoing {
    #[serde(rename = "type")]
    msg_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WsOutgoing {
    fn new(msg_type: &'static str, replay_id: Option<String>) -> Self {
        Self {
            msg_type,
            replay_id,
            step: None,
            result: None,
            error: None,
        }
    }
}

impl From<WsEvent> for WsOutgoing {
    fn from(event: WsEvent) -> Self {
        match event {
            WsEvent::ReplayStep { replay_id, report } => WsOutgoing {
                step: Some(serde_json::to_value(&report).unwrap_or_default()),
                ..WsOutgoing::new("replay_step", Some(replay_id))
            },
            WsEvent::ReplayComplete { replay_id, result } => WsOutgoing {
                result: Some(serde_json::to_value(&result).unwrap_or_default()),
                ..WsOutgoing::new("replay_complete", Some(replay_id))
            },
            WsEvent::Error { replay_id, error } => WsOutgoing {
                error: Some(error),
                ..WsOutgoing::new("error", Some(replay_id))
            },
            WsEvent::Pong => WsOutgoing::new("pong", None),
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from client: {}", client_id);
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, state: Arc<AppState>) {
    state.client_connected(&client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe();

    // Forward broadcast events to this client
    let send_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let json = match serde_json::to_string(&WsOutgoing::from(event)) {
                Ok(j) => j,
                Err(_) => continue,
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Incoming messages are only pings
    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(incoming) = serde_json::from_str::<WsIncoming>(&text) {
                    if incoming.msg_type == "ping" {
                        state_clone.broadcast(WsEvent::Pong);
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.client_disconnected(&client_id);
}
