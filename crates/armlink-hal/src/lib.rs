//! `armlink-hal` – hardware abstraction for the arm and its camera.
//!
//! # Modules
//!
//! - [`driver`] – [`ArmDriver`][driver::ArmDriver]: blocking serial-bus
//!   interface to the six joints and the gripper.
//! - [`camera`] – [`ImageSource`][camera::ImageSource] and
//!   [`ImageSourceOpener`][camera::ImageSourceOpener]: blocking frame reads and
//!   retryable device acquisition.
//! - [`sim`] – simulated drivers for headless runs and tests.

pub mod camera;
pub mod driver;
pub mod sim;

pub use camera::{Frame, ImageSource, ImageSourceOpener};
pub use driver::ArmDriver;
pub use sim::{BusCall, SimArm, SimArmProbe, SimCamera};
