//! `GET /video` – per-viewer MJPEG stream.
//!
//! Every viewer gets its own producer task. Each tick it takes the latest
//! frame, draws the overlay, encodes at the current quality on a blocking
//! worker and hands the part to the response body through a one-slot
//! channel. A part the body has not picked up within one frame period counts
//! as late.
//!
//! The producer ends when the viewer goes away (the body, and with it the
//! receiver, is dropped) or when the camera is unavailable for good.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use armlink_types::stats::CameraState;
use armlink_vision::{annotate, encode};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::AppState;

pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

pub async fn stream_video(State(state): State<Arc<AppState>>) -> Response {
    if state.camera.camera_state() == CameraState::Unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "camera unavailable").into_response();
    }

    let (tx, rx) = mpsc::channel::<Bytes>(1);
    tokio::spawn(produce(state, tx));
    let parts = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|part| (Ok::<_, io::Error>(part), rx))
    });

    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

async fn produce(state: Arc<AppState>, tx: mpsc::Sender<Bytes>) {
    let controller = Arc::clone(state.stream());
    info!("video viewer connected");

    loop {
        let started = Instant::now();
        let period = controller.frame_period();

        if state.camera.camera_state() == CameraState::Unavailable {
            warn!("camera unavailable; ending video stream");
            break;
        }

        if let Some(frame) = state.camera.latest() {
            let snapshot = state.coalescer.snapshot();
            let quality = controller.settings().quality;
            let jpeg = tokio::task::spawn_blocking(move || encode(&annotate(&frame, &snapshot), quality))
                .await
                .ok()
                .flatten();

            match jpeg {
                Some(jpeg) => {
                    let len = jpeg.len();
                    let handed_over = Instant::now();
                    if tx.send(part(&jpeg)).await.is_err() {
                        break;
                    }
                    if handed_over.elapsed() > period {
                        controller.record_late(len);
                    } else {
                        controller.record_delivered(len);
                    }
                }
                None => controller.record_skipped(),
            }
        }

        controller.maybe_adapt();
        tokio::select! {
            () = tokio::time::sleep(period.saturating_sub(started.elapsed())) => {}
            () = tx.closed() => break,
        }
    }
    info!("video viewer disconnected");
}

/// One multipart section: boundary, part headers, JPEG, trailing CRLF.
fn part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut out = Vec::with_capacity(head.len() + jpeg.len() + 2);
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(jpeg);
    out.extend_from_slice(b"\r\n");
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_framing() {
        let p = part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        assert!(p.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n"));
        assert!(p.ends_with(&[0xFF, 0xD8, 0xFF, 0xD9, b'\r', b'\n']));
    }
}
