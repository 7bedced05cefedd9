//! `armlink-vision` – camera acquisition and stream shaping.
//!
//! # Modules
//!
//! - [`pipeline`] – [`CameraPipeline`][pipeline::CameraPipeline]: acquisition
//!   thread with bounded device-open retries, publishing into a latest-frame
//!   cell that any number of consumers read.
//! - [`adaptive`] – [`AdaptiveStreamController`][adaptive::AdaptiveStreamController]:
//!   tunes JPEG quality and frame rate from the delivery success rate.
//! - [`encode`] – stateless JPEG encoding via the `image` crate.
//! - [`overlay`] – draws the joint/gripper readout into a frame.

pub mod adaptive;
pub mod encode;
pub mod overlay;
pub mod pipeline;

pub use adaptive::AdaptiveStreamController;
pub use encode::encode;
pub use overlay::annotate;
pub use pipeline::{CameraPipeline, PipelineConfig};
