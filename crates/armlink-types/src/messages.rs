//! Control-channel wire format.
//!
//! Every WebSocket message is one JSON object tagged by `"type"`. The HTTP
//! fallback endpoints reuse the request/reply bodies defined here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ArmError, GripperValue, JointIndex, JointVector};

/// Message received from a control client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness heartbeat.
    Ping,
    /// Partial joint update, keyed by one-based joint number strings.
    /// Key order is preserved so the acknowledgement names the last joint.
    Angles {
        #[serde(default)]
        joints: Map<String, Value>,
    },
    Gripper {
        value: i64,
    },
    Reset,
    /// Detected object reported by a client-side vision model. Informational.
    Target {
        #[serde(default)]
        center: Vec<f64>,
        #[serde(default = "unknown_class")]
        class: String,
        #[serde(default)]
        confidence: f64,
    },
    /// Blocking hardware read of the current pose.
    Sync,
}

fn unknown_class() -> String {
    "unknown".to_string()
}

impl ClientMessage {
    /// Parse one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Malformed`] for invalid JSON, a missing or unknown
    /// `type`, or fields of the wrong shape.
    pub fn parse(text: &str) -> Result<Self, ArmError> {
        serde_json::from_str(text).map_err(|e| ArmError::Malformed(e.to_string()))
    }
}

/// Message sent back to a control client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Ack { m: String },
    TargetAck { m: String, status: String },
    Sync { a: JointVector, g: GripperValue },
    Error { m: String },
}

impl ServerMessage {
    pub fn ack(m: impl Into<String>) -> Self {
        ServerMessage::Ack { m: m.into() }
    }

    pub fn error(err: &ArmError) -> Self {
        ServerMessage::Error { m: err.to_string() }
    }
}

/// Acknowledgement of an angle update: the last joint named and its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleAck {
    pub joint: JointIndex,
    pub degrees: f64,
}

impl fmt::Display for AngleAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}°", self.joint, self.degrees)
    }
}

/// Human-readable acknowledgement for a gripper command.
pub fn gripper_ack_text(value: GripperValue) -> String {
    let status = if value.percent() > 50 { "Open" } else { "Close" };
    format!("Gripper {status} → {value}")
}

pub const RESET_ACK_TEXT: &str = "All Reset";

// ────────────────────────────────────────────────────────────────────────────
// HTTP fallback bodies
// ────────────────────────────────────────────────────────────────────────────

/// Body of `POST /update`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub joints: Map<String, Value>,
}

/// Body of `POST /gripper`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GripperRequest {
    #[serde(default)]
    pub value: i64,
}

/// Short status line returned by the HTTP fallback endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub m: String,
}

/// Body of `GET /sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReply {
    pub a: JointVector,
    pub g: GripperValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angles_message_keeps_joint_order() {
        let msg = ClientMessage::parse(r#"{"type":"angles","joints":{"3":-10,"1":45}}"#).unwrap();
        match msg {
            ClientMessage::Angles { joints } => {
                let keys: Vec<&str> = joints.keys().map(String::as_str).collect();
                assert_eq!(keys, ["3", "1"]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn target_message_defaults() {
        let msg = ClientMessage::parse(r#"{"type":"target"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Target {
                center: vec![],
                class: "unknown".to_string(),
                confidence: 0.0,
            }
        );
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = ClientMessage::parse(r#"{"type":"dance"}"#).unwrap_err();
        assert!(matches!(err, ArmError::Malformed(_)));
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ArmError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"gripper","value":"wide"}"#),
            Err(ArmError::Malformed(_))
        ));
    }

    #[test]
    fn angle_ack_formats_whole_and_fractional_degrees() {
        let ack = AngleAck {
            joint: JointIndex::new(1).unwrap(),
            degrees: 45.0,
        };
        assert_eq!(ack.to_string(), "J1 → 45°");
        let ack = AngleAck {
            joint: JointIndex::new(6).unwrap(),
            degrees: -12.5,
        };
        assert_eq!(ack.to_string(), "J6 → -12.5°");
    }

    #[test]
    fn gripper_ack_wording() {
        assert_eq!(
            gripper_ack_text(GripperValue::new(80).unwrap()),
            "Gripper Open → 80%"
        );
        assert_eq!(
            gripper_ack_text(GripperValue::new(50).unwrap()),
            "Gripper Close → 50%"
        );
    }

    #[test]
    fn server_messages_are_type_tagged() {
        let pong = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(pong, serde_json::json!({"type": "pong"}));

        let ack = serde_json::to_value(ServerMessage::TargetAck {
            m: "Target: cup at (1, 2)".to_string(),
            status: "received".to_string(),
        })
        .unwrap();
        assert_eq!(ack["type"], "target_ack");

        let sync = serde_json::to_value(ServerMessage::Sync {
            a: JointVector([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            g: GripperValue::new(30).unwrap(),
        })
        .unwrap();
        assert_eq!(
            sync,
            serde_json::json!({"type": "sync", "a": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0], "g": 30})
        );
    }

    #[test]
    fn gripper_request_defaults_to_zero() {
        let req: GripperRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.value, 0);
    }
}
