//! [`ArmCoalescer`] – fixed-rate, last-write-wins actuation.
//!
//! UI input arrives in bursts (a slider emits on every pixel of drag). The
//! coalescer merges each update into the cached [`ArmSnapshot`] and overwrites
//! a single [`PendingCommand`]. A dedicated drain thread wakes every 25 ms,
//! takes whatever is pending and issues at most one angle write and one
//! gripper write. Nothing pending means no bus traffic.
//!
//! The driver lives behind one lock (the bus guard). The drain loop and
//! [`ArmCoalescer::sync`] are the only code paths that take it, so bus
//! transactions never overlap.
//!
//! Driver faults are logged and swallowed; the failed command is dropped and
//! the next tick carries whatever is pending by then.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use armlink_hal::ArmDriver;
use armlink_types::messages::AngleAck;
use armlink_types::{ArmError, ArmSnapshot, GripperValue, JointIndex, PendingCommand};
use tracing::{debug, info, warn};

use crate::mailbox::Mailbox;

/// Default drain period.
pub const DEFAULT_DRAIN_PERIOD: Duration = Duration::from_millis(25);

/// Something that can put the arm into its safe pose.
///
/// Implemented by [`ArmCoalescer`]; the heartbeat monitor only sees this trait.
pub trait Failsafe: Send + Sync {
    fn go_safe(&self);
}

/// Timing and speed settings for the coalescer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoalescerConfig {
    pub drain_period: Duration,
    /// Speed passed to every angle write (controller scale 0-100).
    pub angle_speed: u8,
    /// Speed passed to every gripper write (controller scale 0-100).
    pub gripper_speed: u8,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            drain_period: DEFAULT_DRAIN_PERIOD,
            angle_speed: 100,
            gripper_speed: 80,
        }
    }
}

/// Owns the arm driver and serialises all access to it.
pub struct ArmCoalescer {
    bus: Mutex<Box<dyn ArmDriver>>,
    driver_id: String,
    snapshot: Mutex<ArmSnapshot>,
    pending: Mailbox<PendingCommand>,
    config: CoalescerConfig,
    consecutive_faults: AtomicU32,
    running: AtomicBool,
}

impl ArmCoalescer {
    /// Take ownership of `driver` and seed the snapshot from a hardware read.
    ///
    /// Read failures are ignored and the zero pose is assumed.
    pub fn new(mut driver: Box<dyn ArmDriver>, config: CoalescerConfig) -> Self {
        let driver_id = driver.id().to_string();
        let mut snapshot = ArmSnapshot::SAFE;
        match driver.read_angles() {
            Ok(angles) => snapshot.angles = angles,
            Err(e) => warn!(driver = %driver_id, error = %e, "initial angle read failed; assuming zero pose"),
        }
        match driver.read_gripper() {
            Ok(gripper) => snapshot.gripper = gripper,
            Err(e) => warn!(driver = %driver_id, error = %e, "initial gripper read failed; assuming open"),
        }
        info!(driver = %driver_id, angles = ?snapshot.angles.0, gripper = snapshot.gripper.percent(), "arm coalescer ready");

        Self {
            bus: Mutex::new(driver),
            driver_id,
            snapshot: Mutex::new(snapshot),
            pending: Mailbox::new(),
            config,
            consecutive_faults: AtomicU32::new(0),
            running: AtomicBool::new(true),
        }
    }

    // ── Non-blocking command intake ─────────────────────────────────────────

    /// Merge `partial` into the snapshot and queue the full merged vector.
    ///
    /// Returns the last joint/value applied, or `None` when `partial` is empty
    /// (the unchanged vector is still re-queued).
    pub fn set_angles(&self, partial: &[(JointIndex, f64)]) -> Option<AngleAck> {
        let mut snapshot = self.snapshot_lock();
        for &(joint, degrees) in partial {
            snapshot.angles.set(joint, degrees);
        }
        let merged = snapshot.angles;
        self.pending.update(|slot| {
            slot.get_or_insert_with(PendingCommand::default).angles = Some(merged);
        });
        partial
            .last()
            .map(|&(joint, degrees)| AngleAck { joint, degrees })
    }

    /// Queue a gripper target.
    pub fn set_gripper(&self, value: GripperValue) {
        let mut snapshot = self.snapshot_lock();
        snapshot.gripper = value;
        self.pending.update(|slot| {
            slot.get_or_insert_with(PendingCommand::default).gripper = Some(value);
        });
    }

    /// Queue the all-zero pose with the gripper open.
    pub fn reset(&self) {
        self.command_pose(ArmSnapshot::SAFE);
    }

    fn command_pose(&self, pose: ArmSnapshot) {
        let mut snapshot = self.snapshot_lock();
        *snapshot = pose;
        self.pending.put(PendingCommand {
            angles: Some(pose.angles),
            gripper: Some(pose.gripper),
        });
    }

    /// Copy of the cached pose. Never touches the bus.
    pub fn snapshot(&self) -> ArmSnapshot {
        *self.snapshot_lock()
    }

    /// Copy of the not-yet-drained command, if any.
    pub fn pending(&self) -> Option<PendingCommand> {
        self.pending.peek()
    }

    /// Bus calls that have failed in a row since the last success.
    pub fn bus_faults(&self) -> u32 {
        self.consecutive_faults.load(Ordering::Relaxed)
    }

    // ── Bus access ──────────────────────────────────────────────────────────

    /// Blocking round-trip read of angles and gripper.
    ///
    /// Anything already pending is flushed to the bus first, so a read never
    /// overtakes an earlier command. On a driver fault the cached snapshot is
    /// returned instead.
    pub fn sync(&self) -> ArmSnapshot {
        let mut bus = self.bus_lock();
        self.drain_with(&mut **bus);
        let read = bus
            .read_angles()
            .and_then(|angles| bus.read_gripper().map(|gripper| ArmSnapshot { angles, gripper }));

        match read {
            Ok(fresh) => {
                self.note_success();
                // Still under the bus guard: a command queued during the read
                // cannot have been drained yet and is fresher than the hardware.
                let mut snapshot = self.snapshot_lock();
                if self.pending.is_empty() {
                    *snapshot = fresh;
                }
                debug!(angles = ?fresh.angles.0, gripper = fresh.gripper.percent(), "sync read");
                fresh
            }
            Err(e) => {
                self.note_fault("sync", &e);
                drop(bus);
                self.snapshot()
            }
        }
    }

    /// Run one drain tick. Returns the number of bus writes attempted.
    pub fn drain_once(&self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let mut bus = self.bus_lock();
        self.drain_with(&mut **bus)
    }

    fn drain_with(&self, bus: &mut dyn ArmDriver) -> usize {
        let Some(command) = self.pending.take() else {
            return 0;
        };
        let mut writes = 0;
        if let Some(angles) = command.angles {
            writes += 1;
            match bus.write_angles(&angles, self.config.angle_speed) {
                Ok(()) => self.note_success(),
                Err(e) => self.note_fault("write_angles", &e),
            }
        }
        if let Some(gripper) = command.gripper {
            writes += 1;
            match bus.write_gripper(gripper, self.config.gripper_speed) {
                Ok(()) => self.note_success(),
                Err(e) => self.note_fault("write_gripper", &e),
            }
        }
        writes
    }

    /// Start the fixed-period drain thread. It runs until [`shutdown`][Self::shutdown].
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn_drain_loop(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        let this = Arc::clone(self);
        thread::Builder::new()
            .name("arm-drain".to_string())
            .spawn(move || {
                let period = this.config.drain_period;
                info!(period_ms = period.as_millis() as u64, "drain loop started");
                while this.running.load(Ordering::Acquire) {
                    let started = Instant::now();
                    this.drain_once();
                    thread::sleep(period.saturating_sub(started.elapsed()));
                }
                info!("drain loop stopped");
            })
    }

    /// Stop the drain loop after its current tick.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn note_success(&self) {
        self.consecutive_faults.store(0, Ordering::Relaxed);
    }

    fn note_fault(&self, op: &str, err: &ArmError) {
        let faults = self.consecutive_faults.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(driver = %self.driver_id, op, consecutive_faults = faults, error = %err, "bus call failed");
    }

    fn bus_lock(&self) -> MutexGuard<'_, Box<dyn ArmDriver>> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_lock(&self) -> MutexGuard<'_, ArmSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Failsafe for ArmCoalescer {
    fn go_safe(&self) {
        warn!(driver = %self.driver_id, "moving arm to safe pose");
        self.command_pose(ArmSnapshot::SAFE);
    }
}
