//! Shared data model for the armlink workspace.
//!
//! Pose types ([`JointVector`], [`GripperValue`], [`ArmSnapshot`]), the
//! coalescer's [`PendingCommand`], connection identity, the control-channel
//! wire messages ([`messages`]), streaming statistics ([`stats`]) and the
//! workspace-wide [`ArmError`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod messages;
pub mod stats;

/// Number of joints on the arm.
pub const JOINT_COUNT: usize = 6;

// ────────────────────────────────────────────────────────────────────────────
// Joints
// ────────────────────────────────────────────────────────────────────────────

/// One-based joint number, guaranteed to lie in `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointIndex(u8);

impl JointIndex {
    /// Build a joint index from its one-based number.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::InvalidJoint`] when `number` is outside `1..=6`.
    pub fn new(number: u8) -> Result<Self, ArmError> {
        if (1..=JOINT_COUNT as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ArmError::InvalidJoint(number.to_string()))
        }
    }

    /// The one-based joint number (`1` for J1).
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position of this joint inside a [`JointVector`].
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Iterate over J1..=J6 in order.
    pub fn all() -> impl Iterator<Item = JointIndex> {
        (1..=JOINT_COUNT as u8).map(JointIndex)
    }
}

impl FromStr for JointIndex {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(|n| JointIndex::new(n).ok())
            .ok_or_else(|| ArmError::InvalidJoint(s.to_string()))
    }
}

impl fmt::Display for JointIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J{}", self.0)
    }
}

/// Six joint angles in degrees, J1 first.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointVector(pub [f64; JOINT_COUNT]);

impl JointVector {
    /// The all-zero pose.
    pub const ZERO: JointVector = JointVector([0.0; JOINT_COUNT]);

    pub fn get(&self, joint: JointIndex) -> f64 {
        self.0[joint.slot()]
    }

    pub fn set(&mut self, joint: JointIndex, degrees: f64) {
        self.0[joint.slot()] = degrees;
    }
}

impl From<[f64; JOINT_COUNT]> for JointVector {
    fn from(angles: [f64; JOINT_COUNT]) -> Self {
        Self(angles)
    }
}

/// Inclusive angular range for a single joint, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimit {
    pub min: f64,
    pub max: f64,
}

impl JointLimit {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, degrees: f64) -> bool {
        degrees >= self.min && degrees <= self.max
    }
}

/// Mechanical limits for all six joints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits(pub [JointLimit; JOINT_COUNT]);

impl JointLimits {
    /// Limits of the 270 mm six-axis desktop arm this workspace drives.
    pub const MECHARM_270: JointLimits = JointLimits([
        JointLimit::new(-160.0, 160.0),
        JointLimit::new(-90.0, 90.0),
        JointLimit::new(-180.0, 45.0),
        JointLimit::new(-160.0, 160.0),
        JointLimit::new(-100.0, 100.0),
        JointLimit::new(-180.0, 180.0),
    ]);

    pub fn limit(&self, joint: JointIndex) -> JointLimit {
        self.0[joint.slot()]
    }

    /// Check that `degrees` is a finite angle inside `joint`'s range.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::AngleOutOfRange`] otherwise.
    pub fn check(&self, joint: JointIndex, degrees: f64) -> Result<(), ArmError> {
        let limit = self.limit(joint);
        if degrees.is_finite() && limit.contains(degrees) {
            Ok(())
        } else {
            Err(ArmError::AngleOutOfRange {
                joint: joint.number(),
                angle: degrees,
                min: limit.min,
                max: limit.max,
            })
        }
    }
}

impl Default for JointLimits {
    fn default() -> Self {
        Self::MECHARM_270
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gripper
// ────────────────────────────────────────────────────────────────────────────

/// Gripper closure in percent: `0` fully open, `100` fully closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct GripperValue(u8);

impl GripperValue {
    pub const OPEN: GripperValue = GripperValue(0);
    pub const CLOSED: GripperValue = GripperValue(100);

    /// # Errors
    ///
    /// Returns [`ArmError::GripperOutOfRange`] when `value` is outside `0..=100`.
    pub fn new(value: i64) -> Result<Self, ArmError> {
        match u8::try_from(value) {
            Ok(v) if v <= 100 => Ok(Self(v)),
            _ => Err(ArmError::GripperOutOfRange(value)),
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for GripperValue {
    type Error = ArmError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        GripperValue::new(value)
    }
}

impl From<GripperValue> for u8 {
    fn from(value: GripperValue) -> Self {
        value.0
    }
}

impl fmt::Display for GripperValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Arm state
// ────────────────────────────────────────────────────────────────────────────

/// Last-known pose of the arm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmSnapshot {
    pub angles: JointVector,
    pub gripper: GripperValue,
}

impl ArmSnapshot {
    /// All joints at zero with the gripper open.
    pub const SAFE: ArmSnapshot = ArmSnapshot {
        angles: JointVector::ZERO,
        gripper: GripperValue::OPEN,
    };
}

/// Not-yet-applied actuation targets. Each field is overwritten, never queued.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingCommand {
    pub angles: Option<JointVector>,
    pub gripper: Option<GripperValue>,
}

impl PendingCommand {
    pub fn is_empty(&self) -> bool {
        self.angles.is_none() && self.gripper.is_none()
    }
}

/// Identity of one control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type covering hardware faults and rejected client input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArmError {
    #[error("Bus fault on {component}: {details}")]
    BusFault { component: String, details: String },

    #[error("Capture fault on {device}: {details}")]
    CaptureFault { device: String, details: String },

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Invalid joint '{0}': expected 1-6")]
    InvalidJoint(String),

    #[error("J{joint} angle {angle}° outside [{min}, {max}]")]
    AngleOutOfRange {
        joint: u8,
        angle: f64,
        min: f64,
        max: f64,
    },

    #[error("Gripper value {0} outside 0-100")]
    GripperOutOfRange(i64),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encode error: {0}")]
    Encode(String),
}
