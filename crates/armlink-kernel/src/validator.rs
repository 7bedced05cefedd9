//! [`InputValidator`] – boundary checks for client commands.
//!
//! Raw control input is validated here before it reaches the coalescer. A
//! message is checked in full before anything is applied, so one bad joint
//! rejects the whole update and leaves the arm state untouched.
//!
//! The coalescer itself never validates; it forwards whatever it is given.

use armlink_types::{ArmError, GripperValue, JointIndex, JointLimits};
use serde_json::{Map, Value};

/// Validates joint maps and gripper values against the arm's limits.
///
/// # Example
///
/// ```
/// use armlink_kernel::validator::InputValidator;
/// use serde_json::json;
///
/// let validator = InputValidator::default();
/// let joints = json!({"1": 45, "3": -10}).as_object().cloned().unwrap();
/// let update = validator.angles(&joints).unwrap();
/// assert_eq!(update.len(), 2);
///
/// let bad = json!({"7": 0}).as_object().cloned().unwrap();
/// assert!(validator.angles(&bad).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    limits: JointLimits,
}

impl InputValidator {
    pub fn new(limits: JointLimits) -> Self {
        Self { limits }
    }

    /// Turn a `{"<joint>": degrees}` map into a typed partial update, keeping
    /// message order.
    ///
    /// # Errors
    ///
    /// - [`ArmError::Malformed`] for an empty map or a non-numeric angle.
    /// - [`ArmError::InvalidJoint`] for a key outside `"1"`..`"6"`.
    /// - [`ArmError::AngleOutOfRange`] for an angle beyond the joint's limit.
    pub fn angles(&self, joints: &Map<String, Value>) -> Result<Vec<(JointIndex, f64)>, ArmError> {
        if joints.is_empty() {
            return Err(ArmError::Malformed("no joints given".to_string()));
        }
        joints
            .iter()
            .map(|(key, value)| {
                let joint: JointIndex = key.parse()?;
                let degrees = value.as_f64().ok_or_else(|| {
                    ArmError::Malformed(format!("{joint} angle must be a number, got {value}"))
                })?;
                self.limits.check(joint, degrees)?;
                Ok((joint, degrees))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`ArmError::GripperOutOfRange`] outside `0..=100`.
    pub fn gripper(&self, value: i64) -> Result<GripperValue, ArmError> {
        GripperValue::new(value)
    }
}
