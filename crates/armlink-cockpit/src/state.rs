//! [`AppState`] – the components every session shares.

use std::sync::Arc;

use armlink_kernel::{ArmCoalescer, HeartbeatMonitor, InputValidator};
use armlink_types::stats::{ArmDiagnostics, Diagnostics, VideoDiagnostics};
use armlink_vision::{AdaptiveStreamController, CameraPipeline};
use chrono::Utc;

/// Constructed once in `main` and handed to the server behind an `Arc`.
pub struct AppState {
    pub coalescer: Arc<ArmCoalescer>,
    pub heartbeat: Arc<HeartbeatMonitor>,
    pub camera: Arc<CameraPipeline>,
    pub validator: InputValidator,
}

impl AppState {
    pub fn new(
        coalescer: Arc<ArmCoalescer>,
        heartbeat: Arc<HeartbeatMonitor>,
        camera: Arc<CameraPipeline>,
    ) -> Self {
        Self {
            coalescer,
            heartbeat,
            camera,
            validator: InputValidator::default(),
        }
    }

    pub fn stream(&self) -> &Arc<AdaptiveStreamController> {
        self.camera.controller()
    }

    /// Point-in-time operational report. Never touches the bus.
    pub fn diagnostics(&self) -> Diagnostics {
        let snapshot = self.coalescer.snapshot();
        Diagnostics {
            arm: ArmDiagnostics {
                angles: snapshot.angles,
                gripper: snapshot.gripper,
                bus_faults: self.coalescer.bus_faults(),
            },
            video: VideoDiagnostics {
                stats: self.stream().stats(),
                camera: self.camera.camera_state(),
            },
            clients: self.heartbeat.client_count(),
            heartbeat_timeout_s: self.heartbeat.timeout().as_secs_f64(),
            generated_at: Utc::now(),
        }
    }
}
