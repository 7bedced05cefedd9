//! [`ControlHandler`] – turns control messages into arm commands.
//!
//! Shared by the WebSocket session and the HTTP fallback endpoints so both
//! surfaces validate and acknowledge identically. Every input is validated in
//! full before anything is applied; a rejected message leaves the arm state
//! untouched.

use std::sync::Arc;

use armlink_types::messages::{ClientMessage, RESET_ACK_TEXT, ServerMessage, gripper_ack_text};
use armlink_types::{ArmError, ArmSnapshot, ConnectionId};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::state::AppState;

#[derive(Clone)]
pub struct ControlHandler {
    state: Arc<AppState>,
}

impl ControlHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Parse and dispatch one text frame. Always yields exactly one reply.
    pub async fn handle_text(&self, text: &str, conn: Option<ConnectionId>) -> ServerMessage {
        match ClientMessage::parse(text) {
            Ok(msg) => self.handle(msg, conn).await,
            Err(e) => {
                debug!(connection = ?conn, error = %e, "rejected control message");
                ServerMessage::error(&e)
            }
        }
    }

    /// Dispatch a parsed message. `conn` identifies the WebSocket session a
    /// ping belongs to; HTTP callers pass `None`.
    pub async fn handle(&self, msg: ClientMessage, conn: Option<ConnectionId>) -> ServerMessage {
        let reply = match msg {
            ClientMessage::Ping => {
                if let Some(id) = conn {
                    self.state.heartbeat.touch(id);
                }
                Ok(ServerMessage::Pong)
            }
            ClientMessage::Angles { joints } => self.set_angles(&joints).map(ServerMessage::ack),
            ClientMessage::Gripper { value } => self.set_gripper(value).map(ServerMessage::ack),
            ClientMessage::Reset => Ok(ServerMessage::ack(self.reset())),
            ClientMessage::Target {
                center,
                class,
                confidence,
            } => Ok(target_ack(&center, &class, confidence)),
            ClientMessage::Sync => {
                let snapshot = self.sync().await;
                Ok(ServerMessage::Sync {
                    a: snapshot.angles,
                    g: snapshot.gripper,
                })
            }
        };
        reply.unwrap_or_else(|e| {
            debug!(connection = ?conn, error = %e, "rejected control message");
            ServerMessage::error(&e)
        })
    }

    /// Validate and queue a partial joint update. Returns the ack text.
    ///
    /// # Errors
    ///
    /// Any [`InputValidator`][armlink_kernel::InputValidator] rejection.
    pub fn set_angles(&self, joints: &Map<String, Value>) -> Result<String, ArmError> {
        let update = self.state.validator.angles(joints)?;
        self.state
            .coalescer
            .set_angles(&update)
            .map(|ack| ack.to_string())
            .ok_or_else(|| ArmError::Malformed("no joints given".to_string()))
    }

    /// # Errors
    ///
    /// Returns [`ArmError::GripperOutOfRange`] outside `0..=100`.
    pub fn set_gripper(&self, value: i64) -> Result<String, ArmError> {
        let value = self.state.validator.gripper(value)?;
        self.state.coalescer.set_gripper(value);
        Ok(gripper_ack_text(value))
    }

    pub fn reset(&self) -> String {
        self.state.coalescer.reset();
        RESET_ACK_TEXT.to_string()
    }

    /// Blocking hardware read, run off the async workers.
    pub async fn sync(&self) -> ArmSnapshot {
        let coalescer = Arc::clone(&self.state.coalescer);
        match tokio::task::spawn_blocking(move || coalescer.sync()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "sync task failed; serving cached pose");
                self.state.coalescer.snapshot()
            }
        }
    }
}

fn target_ack(center: &[f64], class: &str, confidence: f64) -> ServerMessage {
    let x = center.first().copied().unwrap_or(0.0);
    let y = center.get(1).copied().unwrap_or(0.0);
    info!(class, confidence, x, y, "target reported");
    ServerMessage::TargetAck {
        m: format!("Target: {class} at ({x}, {y})"),
        status: "received".to_string(),
    }
}
