//! JSON fallback endpoints for clients without WebSocket support, plus
//! `GET /diagnostics`.
//!
//! Each endpoint goes through the same [`ControlHandler`] as the control
//! channel. Invalid input is answered with `400` and `{"m": "<reason>"}`.

use std::sync::Arc;

use armlink_types::ArmError;
use armlink_types::messages::{GripperRequest, StatusReply, SyncReply, UpdateRequest};
use armlink_types::stats::Diagnostics;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::control::ControlHandler;
use crate::state::AppState;

/// Rejected input, rendered as `400 {"m": "<reason>"}`.
#[derive(Debug)]
pub struct ApiError(pub ArmError);

impl From<ArmError> for ApiError {
    fn from(err: ArmError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(error = %self.0, "rejected fallback request");
        (StatusCode::BAD_REQUEST, Json(StatusReply { m: self.0.to_string() })).into_response()
    }
}

/// Deserialize a request body. An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ArmError> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ArmError::Malformed(e.to_string()))
}

/// `POST /update {"joints": {"1": 45}}`
pub async fn update(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StatusReply>, ApiError> {
    let req: UpdateRequest = parse_body(&body)?;
    let m = ControlHandler::new(state).set_angles(&req.joints)?;
    Ok(Json(StatusReply { m }))
}

/// `POST /gripper {"value": 80}`
pub async fn gripper(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StatusReply>, ApiError> {
    let req: GripperRequest = parse_body(&body)?;
    let m = ControlHandler::new(state).set_gripper(req.value)?;
    Ok(Json(StatusReply { m }))
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Json<StatusReply> {
    Json(StatusReply {
        m: ControlHandler::new(state).reset(),
    })
}

pub async fn sync(State(state): State<Arc<AppState>>) -> Json<SyncReply> {
    let snapshot = ControlHandler::new(state).sync().await;
    Json(SyncReply {
        a: snapshot.angles,
        g: snapshot.gripper,
    })
}

pub async fn diagnostics(State(state): State<Arc<AppState>>) -> Json<Diagnostics> {
    Json(state.diagnostics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn empty_body_reads_as_empty_object() {
        let v: Value = parse_body(b"").unwrap();
        assert_eq!(v, serde_json::json!({}));
        let v: Value = parse_body(b" \r\n").unwrap();
        assert_eq!(v, serde_json::json!({}));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_body::<UpdateRequest>(b"{not json"),
            Err(ArmError::Malformed(_))
        ));
        assert!(matches!(
            parse_body::<GripperRequest>(br#"{"value":"half"}"#),
            Err(ArmError::Malformed(_))
        ));
    }

    #[test]
    fn rejection_is_a_400() {
        let response = ApiError(ArmError::GripperOutOfRange(101)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
