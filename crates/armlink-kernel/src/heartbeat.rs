//! [`HeartbeatMonitor`] – client liveness tracking and failsafe trigger.
//!
//! Every control connection is registered on connect and stamped on every
//! `ping`. A monitor task calls [`HeartbeatMonitor::check`] once per second:
//! when at least one connection is registered and *all* of them have been
//! silent for longer than the timeout, the arm is sent to its safe pose. The
//! check fires again on every tick while the clients stay stale.
//!
//! No registered connections is not a fault; the monitor does nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use armlink_types::ConnectionId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::coalescer::Failsafe;

/// Silence after which a connection counts as stale.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Period of the monitor task.
pub const MONITOR_PERIOD: Duration = Duration::from_secs(1);

/// Tracks the last heartbeat of every connected control client.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use armlink_kernel::heartbeat::HeartbeatMonitor;
/// use armlink_types::ConnectionId;
///
/// let monitor = HeartbeatMonitor::new(Duration::from_secs(5));
/// let id = ConnectionId::new();
/// monitor.register(id);
/// monitor.touch(id);
///
/// assert!(!monitor.all_stale());
/// ```
pub struct HeartbeatMonitor {
    clients: Mutex<HashMap<ConnectionId, Instant>>,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Start tracking `id`. Its deadline starts now.
    pub fn register(&self, id: ConnectionId) {
        let count = {
            let mut clients = self.clients();
            clients.insert(id, Instant::now());
            clients.len()
        };
        info!(connection = %id, clients = count, "control client connected");
    }

    /// Record a heartbeat for `id`. No-op for unregistered connections.
    pub fn touch(&self, id: ConnectionId) {
        match self.clients().get_mut(&id) {
            Some(last) => *last = Instant::now(),
            None => debug!(connection = %id, "heartbeat from unregistered connection ignored"),
        }
    }

    /// Stop tracking `id`.
    pub fn unregister(&self, id: ConnectionId) {
        let count = {
            let mut clients = self.clients();
            clients.remove(&id);
            clients.len()
        };
        info!(connection = %id, clients = count, "control client disconnected");
    }

    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `true` when at least one client is registered and every client has
    /// been silent for longer than the timeout.
    pub fn all_stale(&self) -> bool {
        let clients = self.clients();
        !clients.is_empty()
            && clients
                .values()
                .all(|last| last.elapsed() > self.timeout)
    }

    /// Run one monitor tick: call `go_safe` exactly once if every client is
    /// stale. Returns whether the failsafe fired.
    pub fn check(&self, failsafe: &dyn Failsafe) -> bool {
        if !self.all_stale() {
            return false;
        }
        warn!(
            clients = self.client_count(),
            timeout_s = self.timeout.as_secs_f64(),
            "heartbeat timeout on every client; engaging failsafe"
        );
        failsafe.go_safe();
        true
    }

    /// Spawn the periodic monitor on the current Tokio runtime.
    pub fn spawn_monitor(
        self: &Arc<Self>,
        failsafe: Arc<dyn Failsafe>,
        period: Duration,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.check(failsafe.as_ref());
            }
        })
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ConnectionId, Instant>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}
