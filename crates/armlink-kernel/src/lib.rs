//! `armlink-kernel` – actuation and safety core
//!
//! Sits between the network sessions and the arm driver. It does not talk to
//! clients; it decides what reaches the bus and when.
//!
//! # Modules
//!
//! - [`mailbox`] – [`Mailbox`][mailbox::Mailbox]: single-slot last-write-wins
//!   cell shared by the coalescer and the camera pipeline.
//! - [`coalescer`] – [`ArmCoalescer`][coalescer::ArmCoalescer]: merges bursty
//!   angle/gripper updates and drains them to the driver at a fixed 25 ms
//!   cadence; also the blocking `sync` read.
//! - [`heartbeat`] – [`HeartbeatMonitor`][heartbeat::HeartbeatMonitor]: per
//!   connection liveness; sends the arm to its safe pose when every client
//!   goes silent.
//! - [`validator`] – [`InputValidator`][validator::InputValidator]: rejects
//!   malformed joint indices, angles and gripper values at the boundary.

pub mod coalescer;
pub mod heartbeat;
pub mod mailbox;
pub mod validator;

pub use coalescer::{ArmCoalescer, CoalescerConfig, Failsafe};
pub use heartbeat::HeartbeatMonitor;
pub use mailbox::Mailbox;
pub use validator::InputValidator;
