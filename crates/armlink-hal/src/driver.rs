//! `ArmDriver` trait for the serial-bus arm controller.
//!
//! The driver is the single point of physical actuation. Every call blocks on
//! the bus; callers must never issue two calls concurrently, which the
//! coalescer guarantees by owning the driver behind one lock.

use armlink_types::{ArmError, GripperValue, JointVector};

/// Blocking interface to a six-joint arm with a gripper.
pub trait ArmDriver: Send {
    /// Stable identifier for this driver, e.g. `"mecharm"` or `"sim"`.
    fn id(&self) -> &str;

    /// Command all six joints at once. `speed` is the controller's 0-100 scale.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::BusFault`] when the bus transaction fails.
    fn write_angles(&mut self, angles: &JointVector, speed: u8) -> Result<(), ArmError>;

    /// Command the gripper position.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::BusFault`] when the bus transaction fails.
    fn write_gripper(&mut self, value: GripperValue, speed: u8) -> Result<(), ArmError>;

    /// Read back the current joint angles.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::BusFault`] on a failed or empty read.
    fn read_angles(&mut self) -> Result<JointVector, ArmError>;

    /// Read back the current gripper position.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::BusFault`] on a failed or empty read.
    fn read_gripper(&mut self) -> Result<GripperValue, ArmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process driver used only for tests.
    struct MockDriver {
        angles: JointVector,
        gripper: GripperValue,
    }

    impl ArmDriver for MockDriver {
        fn id(&self) -> &str {
            "mock"
        }

        fn write_angles(&mut self, angles: &JointVector, _speed: u8) -> Result<(), ArmError> {
            self.angles = *angles;
            Ok(())
        }

        fn write_gripper(&mut self, value: GripperValue, _speed: u8) -> Result<(), ArmError> {
            self.gripper = value;
            Ok(())
        }

        fn read_angles(&mut self) -> Result<JointVector, ArmError> {
            Ok(self.angles)
        }

        fn read_gripper(&mut self) -> Result<GripperValue, ArmError> {
            Ok(self.gripper)
        }
    }

    #[test]
    fn driver_is_object_safe_and_echoes() {
        let mut driver: Box<dyn ArmDriver> = Box::new(MockDriver {
            angles: JointVector::ZERO,
            gripper: GripperValue::OPEN,
        });
        let target = JointVector([10.0, -20.0, 30.0, 0.0, 5.0, 90.0]);
        driver.write_angles(&target, 100).unwrap();
        driver.write_gripper(GripperValue::CLOSED, 80).unwrap();
        assert_eq!(driver.id(), "mock");
        assert_eq!(driver.read_angles().unwrap(), target);
        assert_eq!(driver.read_gripper().unwrap(), GripperValue::CLOSED);
    }
}
