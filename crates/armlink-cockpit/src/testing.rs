//! Shared fixtures for the cockpit tests.

use std::sync::Arc;
use std::time::Duration;

use armlink_hal::sim::{SimArm, SimArmProbe, SimCamera};
use armlink_hal::{ImageSource, ImageSourceOpener};
use armlink_kernel::{ArmCoalescer, CoalescerConfig, HeartbeatMonitor};
use armlink_types::ArmError;
use armlink_vision::{AdaptiveStreamController, CameraPipeline, PipelineConfig};

use crate::state::AppState;

/// App state over `arm` and an 8×8 simulated camera. The drain loop is not
/// started; tests drive it with `drain_once`.
pub(crate) fn test_state(arm: SimArm) -> (Arc<AppState>, SimArmProbe) {
    let opener = || -> Result<Box<dyn ImageSource>, ArmError> {
        Ok(Box::new(SimCamera::new("sim", 8, 8)))
    };
    state_with_camera(arm, opener, PipelineConfig::default())
}

/// Like [`test_state`] with a caller-supplied camera opener.
pub(crate) fn state_with_camera(
    arm: SimArm,
    opener: impl ImageSourceOpener + 'static,
    config: PipelineConfig,
) -> (Arc<AppState>, SimArmProbe) {
    let probe = arm.probe();
    let coalescer = Arc::new(ArmCoalescer::new(Box::new(arm), CoalescerConfig::default()));
    probe.clear_calls();
    let camera =
        CameraPipeline::start(opener, config, Arc::new(AdaptiveStreamController::default())).unwrap();
    let state = AppState::new(
        coalescer,
        Arc::new(HeartbeatMonitor::new(Duration::from_secs(5))),
        Arc::new(camera),
    );
    (Arc::new(state), probe)
}
