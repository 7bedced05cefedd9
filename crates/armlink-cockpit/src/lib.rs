//! `armlink-cockpit` – network surface of the arm.
//!
//! An axum router (default port `8080`) over a shared [`AppState`]:
//!
//! 1. **Control** – one WebSocket session per client. Every text frame is a
//!    JSON [`ClientMessage`] answered with exactly one [`ServerMessage`].
//!    Sessions register with the heartbeat monitor; pings keep them alive.
//!
//! 2. **Video** – `GET /video` streams `multipart/x-mixed-replace` JPEG
//!    parts. Each viewer runs its own loop at the adaptive frame rate and
//!    reports delivery outcomes back to the stream controller.
//!
//! 3. **Fallback & diagnostics** – JSON endpoints mirroring the control
//!    messages, plus `GET /diagnostics`.
//!
//! [`ClientMessage`]: armlink_types::messages::ClientMessage
//! [`ServerMessage`]: armlink_types::messages::ServerMessage

pub mod api;
pub mod control;
pub mod server;
pub mod session;
pub mod state;
pub mod video;

#[cfg(test)]
mod testing;

pub use control::ControlHandler;
pub use server::{CockpitServer, DEFAULT_PORT, router};
pub use state::AppState;
