//! Simulated hardware for running the full stack without an arm or camera.
//!
//! [`SimArm`] echoes every command back on read and records each bus call so
//! tests can assert on exactly what reached the driver. Faults can be injected
//! through its [`SimArmProbe`]. [`SimCamera`] produces a scrolling test
//! pattern.
//!
//! # Example
//!
//! ```rust
//! use armlink_hal::driver::ArmDriver;
//! use armlink_hal::sim::{BusCall, SimArm};
//! use armlink_types::GripperValue;
//!
//! let mut arm = SimArm::new();
//! let probe = arm.probe();
//! arm.write_gripper(GripperValue::CLOSED, 80).expect("sim write must succeed");
//! assert_eq!(probe.calls(), vec![BusCall::WriteGripper(GripperValue::CLOSED)]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use armlink_types::{ArmError, GripperValue, JointVector};

use crate::camera::{Frame, ImageSource};
use crate::driver::ArmDriver;

// ────────────────────────────────────────────────────────────────────────────
// Simulated arm
// ────────────────────────────────────────────────────────────────────────────

/// One call that reached the simulated bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusCall {
    WriteAngles(JointVector),
    WriteGripper(GripperValue),
    ReadAngles,
    ReadGripper,
}

#[derive(Debug, Default)]
struct SimArmState {
    angles: JointVector,
    gripper: GripperValue,
    calls: Vec<BusCall>,
    failures_remaining: u32,
}

/// Echoing arm driver. Always succeeds unless faults are injected.
pub struct SimArm {
    state: Arc<Mutex<SimArmState>>,
    latency: Duration,
}

impl SimArm {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            latency: Duration::ZERO,
        }
    }

    /// Start from a non-zero pose.
    pub fn with_pose(self, angles: JointVector, gripper: GripperValue) -> Self {
        {
            let mut state = lock(&self.state);
            state.angles = angles;
            state.gripper = gripper;
        }
        self
    }

    /// Block for `latency` on every call to mimic a serial round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Handle for inspecting calls and injecting faults after the driver has
    /// been moved into its owner.
    pub fn probe(&self) -> SimArmProbe {
        SimArmProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn transact(&self, call: BusCall) -> Result<MutexGuard<'_, SimArmState>, ArmError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let mut state = lock(&self.state);
        state.calls.push(call);
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(ArmError::BusFault {
                component: "sim".to_string(),
                details: format!("injected fault on {call:?}"),
            });
        }
        Ok(state)
    }
}

impl Default for SimArm {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmDriver for SimArm {
    fn id(&self) -> &str {
        "sim"
    }

    fn write_angles(&mut self, angles: &JointVector, _speed: u8) -> Result<(), ArmError> {
        self.transact(BusCall::WriteAngles(*angles))?.angles = *angles;
        Ok(())
    }

    fn write_gripper(&mut self, value: GripperValue, _speed: u8) -> Result<(), ArmError> {
        self.transact(BusCall::WriteGripper(value))?.gripper = value;
        Ok(())
    }

    fn read_angles(&mut self) -> Result<JointVector, ArmError> {
        Ok(self.transact(BusCall::ReadAngles)?.angles)
    }

    fn read_gripper(&mut self) -> Result<GripperValue, ArmError> {
        Ok(self.transact(BusCall::ReadGripper)?.gripper)
    }
}

/// Shared view into a [`SimArm`].
#[derive(Clone)]
pub struct SimArmProbe {
    state: Arc<Mutex<SimArmState>>,
}

impl SimArmProbe {
    /// Every bus call so far, oldest first.
    pub fn calls(&self) -> Vec<BusCall> {
        lock(&self.state).calls.clone()
    }

    /// Only the angle writes, oldest first.
    pub fn angle_writes(&self) -> Vec<JointVector> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                BusCall::WriteAngles(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Only the gripper writes, oldest first.
    pub fn gripper_writes(&self) -> Vec<GripperValue> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                BusCall::WriteGripper(g) => Some(*g),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Make the next `n` bus calls fail with [`ArmError::BusFault`].
    pub fn fail_next(&self, n: u32) {
        lock(&self.state).failures_remaining = n;
    }

    /// Pose the simulated hardware currently holds.
    pub fn pose(&self) -> (JointVector, GripperValue) {
        let state = lock(&self.state);
        (state.angles, state.gripper)
    }
}

fn lock(state: &Mutex<SimArmState>) -> MutexGuard<'_, SimArmState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

/// A camera that renders a diagonal gradient which scrolls one pixel per frame.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    frame_no: u32,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            frame_no: 0,
        }
    }
}

impl ImageSource for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_frame(&mut self) -> Result<Frame, ArmError> {
        let shift = self.frame_no;
        self.frame_no = self.frame_no.wrapping_add(1);
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = (x.wrapping_add(y).wrapping_add(shift) % 256) as u8;
                data.extend_from_slice(&[v, 255 - v, 96]);
            }
        }
        Frame::new(self.width, self.height, data)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_arm_echoes_commands_on_read() {
        let mut arm = SimArm::new();
        let target = JointVector([45.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        arm.write_angles(&target, 100).unwrap();
        arm.write_gripper(GripperValue::new(70).unwrap(), 80).unwrap();
        assert_eq!(arm.read_angles().unwrap(), target);
        assert_eq!(arm.read_gripper().unwrap().percent(), 70);
    }

    #[test]
    fn probe_records_calls_in_order() {
        let mut arm = SimArm::new();
        let probe = arm.probe();
        arm.write_angles(&JointVector::ZERO, 100).unwrap();
        arm.read_gripper().unwrap();
        assert_eq!(
            probe.calls(),
            vec![BusCall::WriteAngles(JointVector::ZERO), BusCall::ReadGripper]
        );
        assert_eq!(probe.angle_writes(), vec![JointVector::ZERO]);
        assert!(probe.gripper_writes().is_empty());
        probe.clear_calls();
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn injected_faults_fail_then_recover() {
        let mut arm = SimArm::new();
        let probe = arm.probe();
        probe.fail_next(2);
        assert!(matches!(arm.read_angles(), Err(ArmError::BusFault { .. })));
        assert!(arm.write_gripper(GripperValue::CLOSED, 80).is_err());
        // A failed write must not change the held pose.
        assert_eq!(probe.pose().1, GripperValue::OPEN);
        assert!(arm.read_angles().is_ok());
    }

    #[test]
    fn with_pose_sets_initial_state() {
        let pose = JointVector([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut arm = SimArm::new().with_pose(pose, GripperValue::CLOSED);
        assert_eq!(arm.read_angles().unwrap(), pose);
        assert_eq!(arm.read_gripper().unwrap(), GripperValue::CLOSED);
    }

    #[test]
    fn sim_camera_frames_have_expected_size_and_scroll() {
        let mut cam = SimCamera::new("sim", 8, 4);
        let first = cam.read_frame().unwrap();
        let second = cam.read_frame().unwrap();
        assert_eq!(first.data.len(), 8 * 4 * 3);
        assert_ne!(first, second);
    }
}
