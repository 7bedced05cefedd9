//! `GET /ws` – one control session per WebSocket.
//!
//! The session registers a [`ConnectionId`] with the heartbeat monitor,
//! answers every text frame with exactly one JSON reply and unregisters when
//! the socket closes or errors.

use std::sync::Arc;

use armlink_types::ConnectionId;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tracing::{debug, info, warn};

use crate::control::ControlHandler;
use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| control_session(socket, state))
}

async fn control_session(mut socket: WebSocket, state: Arc<AppState>) {
    let id = ConnectionId::new();
    state.heartbeat.register(id);
    let handler = ControlHandler::new(Arc::clone(&state));
    info!(connection = %id, "control session opened");

    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = handler.handle_text(&text, Some(id)).await;
                match serde_json::to_string(&reply) {
                    Ok(json) => {
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(connection = %id, error = %e, "reply serialization failed"),
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %id, error = %e, "websocket read error");
                break;
            }
        }
    }

    state.heartbeat.unregister(id);
    info!(connection = %id, "control session closed");
}
