//! Streaming statistics and the diagnostics report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GripperValue, JointVector};

/// Current JPEG quality and target frame rate of the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub quality: u8,
    pub fps: u8,
}

/// Lifecycle of the camera device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    /// Device acquisition still in progress.
    Opening,
    Running,
    /// Every open attempt failed; no frames for the rest of the process.
    Unavailable,
}

/// Snapshot of stream delivery counters.
///
/// The un-prefixed counters cover the current adaptation window only; the
/// `total_` counters accumulate for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub fps: u8,
    pub quality: u8,
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub bytes_sent: u64,
    pub total_frames_sent: u64,
    pub total_frames_skipped: u64,
    pub total_bytes_sent: u64,
}

/// Arm section of the diagnostics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmDiagnostics {
    pub angles: JointVector,
    pub gripper: GripperValue,
    /// Consecutive failed bus calls since the last success.
    pub bus_faults: u32,
}

/// Video section of the diagnostics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDiagnostics {
    #[serde(flatten)]
    pub stats: StreamStats,
    pub camera: CameraState,
}

/// Read-only operational report served at `GET /diagnostics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub arm: ArmDiagnostics,
    pub video: VideoDiagnostics,
    pub clients: usize,
    pub heartbeat_timeout_s: f64,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_diagnostics_flattens_stats() {
        let video = VideoDiagnostics {
            stats: StreamStats {
                fps: 12,
                quality: 65,
                frames_sent: 3,
                frames_skipped: 1,
                bytes_sent: 900,
                total_frames_sent: 30,
                total_frames_skipped: 2,
                total_bytes_sent: 9000,
            },
            camera: CameraState::Running,
        };
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["fps"], 12);
        assert_eq!(json["frames_skipped"], 1);
        assert_eq!(json["camera"], "running");
    }
}
