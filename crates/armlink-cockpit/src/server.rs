//! [`CockpitServer`] – HTTP + WebSocket front door.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * `GET /ws` with `Upgrade: websocket` → control session.
//! * `GET /video` → MJPEG stream, one producer per viewer.
//! * `POST /update`, `POST /gripper`, `POST /reset`, `GET /sync` → JSON
//!   fallback for clients without WebSocket support.
//! * `GET /diagnostics` → operational report.
//!
//! Unknown paths answer `404`, a known path with the wrong method `405`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use armlink_types::ArmError;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::state::AppState;
use crate::{api, session, video};

/// Default TCP port for the HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// Upper bound on a JSON request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Time allowed to produce a response head. Streaming bodies and upgraded
/// sockets are not bounded by it.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

const INDEX: &str = "armlink\n\n\
GET  /ws           control channel (WebSocket)\n\
GET  /video        MJPEG stream\n\
POST /update       {\"joints\":{\"1\":45}}\n\
POST /gripper      {\"value\":50}\n\
POST /reset\n\
GET  /sync\n\
GET  /diagnostics\n";

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Serves the control channel, the video stream and the JSON endpoints.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use armlink_cockpit::{AppState, CockpitServer};
/// # async fn run(state: Arc<AppState>) {
/// CockpitServer::new(state)
///     .with_port(8080)
///     .run()
///     .await
///     .expect("cockpit server failed");
/// # }
/// ```
pub struct CockpitServer {
    state: Arc<AppState>,
    port: u16,
}

impl CockpitServer {
    /// Create a server over `state` on the [`DEFAULT_PORT`].
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Transport`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), ArmError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ArmError::Transport(format!("bind error on {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Transport`] if the accept loop fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ArmError> {
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "cockpit listening");
        }
        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| ArmError::Transport(format!("server error: {e}")))
    }
}

/// All routes over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    routes(state, RESPONSE_TIMEOUT)
}

fn routes(state: Arc<AppState>, timeout: Duration) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(session::upgrade))
        .route("/video", get(video::stream_video))
        .route("/update", post(api::update))
        .route("/gripper", post(api::gripper))
        .route("/reset", post(api::reset))
        .route("/sync", get(api::sync))
        .route("/diagnostics", get(api::diagnostics))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

async fn index() -> &'static str {
    INDEX
}

async fn not_found(uri: Uri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("no route for {}", uri.path()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{state_with_camera, test_state};
    use armlink_hal::{ImageSource, SimArm};
    use armlink_types::JointVector;
    use armlink_types::messages::{ServerMessage, SyncReply};
    use armlink_vision::PipelineConfig;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(CockpitServer::new(state).serve(listener));
        addr
    }

    /// Send one request and read until the server closes the connection.
    async fn http(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
        let raw = format!(
            "{method} {path} HTTP/1.1\r\nHost: arm\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    // ── Constructor ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn default_port_is_8080() {
        let (state, _) = test_state(SimArm::new());
        let server = CockpitServer::new(Arc::clone(&state));
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(CockpitServer::new(state).with_port(9999).port(), 9999);
    }

    // ── HTTP fallback ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_endpoint_acks_and_queues() {
        let (state, probe) = test_state(SimArm::new());
        let addr = spawn_server(Arc::clone(&state)).await;

        let resp = http(addr, "POST", "/update", r#"{"joints":{"2":30}}"#).await;
        assert!(resp.starts_with("HTTP/1.1 200 OK"), "{resp}");
        assert_eq!(body(&resp), r#"{"m":"J2 → 30°"}"#);

        state.coalescer.drain_once();
        assert_eq!(
            probe.angle_writes(),
            vec![JointVector([0.0, 30.0, 0.0, 0.0, 0.0, 0.0])]
        );
    }

    #[tokio::test]
    async fn invalid_input_is_400() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(Arc::clone(&state)).await;

        let resp = http(addr, "POST", "/update", r#"{"joints":{"7":30}}"#).await;
        assert!(resp.starts_with("HTTP/1.1 400"), "{resp}");
        assert!(body(&resp).contains("Invalid joint"));

        let resp = http(addr, "POST", "/gripper", r#"{"value":101}"#).await;
        assert!(resp.starts_with("HTTP/1.1 400"), "{resp}");

        let resp = http(addr, "POST", "/gripper", "{not json").await;
        assert!(resp.starts_with("HTTP/1.1 400"), "{resp}");
        let reply: serde_json::Value = serde_json::from_str(body(&resp)).unwrap();
        assert!(reply["m"].is_string());
        assert_eq!(state.coalescer.pending(), None);
    }

    #[tokio::test]
    async fn gripper_reset_and_sync_endpoints() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(state).await;

        let resp = http(addr, "POST", "/gripper", r#"{"value":80}"#).await;
        assert_eq!(body(&resp), r#"{"m":"Gripper Open → 80%"}"#);

        let resp = http(addr, "POST", "/reset", "").await;
        assert_eq!(body(&resp), r#"{"m":"All Reset"}"#);

        let resp = http(addr, "GET", "/sync", "").await;
        let reply: SyncReply = serde_json::from_str(body(&resp)).unwrap();
        assert_eq!(reply.a, JointVector::ZERO);
        assert_eq!(reply.g.percent(), 0);
    }

    #[tokio::test]
    async fn diagnostics_report_shape() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(state).await;

        let resp = http(addr, "GET", "/diagnostics", "").await;
        let v: serde_json::Value = serde_json::from_str(body(&resp)).unwrap();
        assert_eq!(v["arm"]["angles"].as_array().unwrap().len(), 6);
        assert_eq!(v["arm"]["bus_faults"], 0);
        assert_eq!(v["video"]["fps"], 12);
        assert_eq!(v["video"]["quality"], 65);
        assert_eq!(v["clients"], 0);
        assert_eq!(v["heartbeat_timeout_s"], 5.0);
        assert!(v["video"]["camera"].is_string());
    }

    #[tokio::test]
    async fn unknown_path_and_wrong_method() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(state).await;

        let resp = http(addr, "GET", "/nowhere", "").await;
        assert!(resp.starts_with("HTTP/1.1 404"), "{resp}");
        let resp = http(addr, "GET", "/update", "").await;
        assert!(resp.starts_with("HTTP/1.1 405"), "{resp}");
        let resp = http(addr, "GET", "/", "").await;
        assert!(body(&resp).contains("/diagnostics"));
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(Arc::clone(&state)).await;

        let joints = format!(r#"{{"joints":{{"1":{}}}}}"#, "0".repeat(MAX_BODY_BYTES));
        let resp = http(addr, "POST", "/update", &joints).await;
        assert!(resp.starts_with("HTTP/1.1 413"), "{resp}");
        assert_eq!(state.coalescer.pending(), None);
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let (state, _) = test_state(SimArm::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes(Arc::clone(&state), Duration::from_millis(200));
        tokio::spawn(async move { axum::serve(listener, app).await });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"POST /update HTTP/1.1\r\nHost: arm\r\nConnection: close\r\n\
                  Content-Length: 40\r\n\r\n{\"joints\"",
            )
            .await
            .unwrap();
        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut out))
            .await
            .expect("server kept waiting for the body")
            .unwrap();
        let resp = String::from_utf8_lossy(&out);
        assert!(resp.starts_with("HTTP/1.1 408"), "{resp}");
        assert_eq!(state.coalescer.pending(), None);
    }

    // ── Video ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn video_streams_jpeg_parts() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(Arc::clone(&state)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /video HTTP/1.1\r\nHost: arm\r\n\r\n")
            .await
            .unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            let n = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf))
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or(0);
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received);
            if text.matches("Content-Type: image/jpeg").count() >= 2 {
                break;
            }
        }
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains(video::CONTENT_TYPE));
        assert!(text.matches("Content-Type: image/jpeg").count() >= 2, "{text}");
        drop(stream);

        let stats = state.stream().stats();
        assert!(stats.total_frames_sent + stats.total_frames_skipped >= 1);
        assert!(stats.total_bytes_sent > 0);
    }

    #[tokio::test]
    async fn video_viewers_end_when_the_camera_is_unavailable() {
        let opener = || -> Result<Box<dyn ImageSource>, ArmError> {
            Err(ArmError::DeviceUnavailable("/dev/video0".into()))
        };
        let config = PipelineConfig {
            open_retries: 3,
            open_retry_delay: Duration::from_millis(200),
        };
        let (state, _) = state_with_camera(SimArm::new(), opener, config);
        let addr = spawn_server(Arc::clone(&state)).await;
        // The router takes its own references on first use.
        http(addr, "GET", "/diagnostics", "").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let baseline = Arc::strong_count(&state);

        // Arrives while the device is still being opened; the stream must
        // finish once the retries run out.
        let early = tokio::time::timeout(
            Duration::from_secs(3),
            http(addr, "GET", "/video", ""),
        )
        .await
        .expect("stream did not end after the camera became unavailable");
        assert!(early.starts_with("HTTP/1.1 200"), "{early}");
        assert!(early.contains(video::CONTENT_TYPE), "{early}");

        for _ in 0..5 {
            let resp = http(addr, "GET", "/video", "").await;
            assert!(resp.starts_with("HTTP/1.1 503"), "{resp}");
        }

        assert!(
            wait_until(|| Arc::strong_count(&state) <= baseline).await,
            "state still held by {} references",
            Arc::strong_count(&state)
        );
    }

    // ── WebSocket ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn websocket_session_round_trip() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(Arc::clone(&state)).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        ws.send(Message::Text(r#"{"type":"ping"}"#.into())).await.unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        let reply: ServerMessage = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(reply, ServerMessage::Pong);
        assert_eq!(state.heartbeat.client_count(), 1);

        ws.send(Message::Text(r#"{"type":"angles","joints":{"1":45}}"#.into()))
            .await
            .unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        assert_eq!(reply.to_text().unwrap(), r#"{"type":"ack","m":"J1 → 45°"}"#);

        ws.send(Message::Text(r#"{"type":"angles","joints":{"9":1}}"#.into()))
            .await
            .unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        let reply: ServerMessage = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert!(matches!(reply, ServerMessage::Error { .. }));

        ws.close(None).await.unwrap();
        assert!(wait_until(|| state.heartbeat.client_count() == 0).await);
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_refused() {
        let (state, _) = test_state(SimArm::new());
        let addr = spawn_server(Arc::clone(&state)).await;

        let resp = http(addr, "GET", "/ws", "").await;
        assert!(!resp.starts_with("HTTP/1.1 2"), "{resp}");
        assert!(!resp.starts_with("HTTP/1.1 101"), "{resp}");
        assert_eq!(state.heartbeat.client_count(), 0);
    }
}
