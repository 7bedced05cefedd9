//! [`CameraPipeline`] – decouples frame acquisition from frame delivery.
//!
//! One acquisition thread owns the image source. It first acquires the
//! device through an [`ImageSourceOpener`], retrying a fixed number of times,
//! then reads frames at the controller's current fps and publishes each one
//! into a single-slot frame cell. Stream consumers read the cell at their own
//! pace and never block the acquisition thread.
//!
//! If every open attempt fails the pipeline stays camera-less for the rest of
//! the process: [`CameraPipeline::get_frame`] keeps returning `None`.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use armlink_hal::{Frame, ImageSource, ImageSourceOpener};
use armlink_kernel::Mailbox;
use armlink_types::stats::CameraState;
use tracing::{debug, error, info, warn};

use crate::adaptive::AdaptiveStreamController;

/// Device acquisition settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of open attempts before giving up.
    pub open_retries: u32,
    pub open_retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            open_retries: 3,
            open_retry_delay: Duration::from_secs(1),
        }
    }
}

/// State shared between the pipeline handle and its acquisition thread.
struct Shared {
    frame: Mailbox<Arc<Frame>>,
    state: AtomicU8,
    running: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: CameraState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Handle to the running acquisition thread and its latest frame.
pub struct CameraPipeline {
    shared: Arc<Shared>,
    controller: Arc<AdaptiveStreamController>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CameraPipeline {
    /// Spawn the acquisition thread and return immediately.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start(
        opener: impl ImageSourceOpener + 'static,
        config: PipelineConfig,
        controller: Arc<AdaptiveStreamController>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            frame: Mailbox::new(),
            state: AtomicU8::new(CameraState::Opening as u8),
            running: AtomicBool::new(true),
        });
        let handle = {
            let shared = Arc::clone(&shared);
            let controller = Arc::clone(&controller);
            thread::Builder::new()
                .name("camera-acquire".to_string())
                .spawn(move || acquisition_thread(opener, config, &shared, &controller))?
        };
        Ok(Self {
            shared,
            controller,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Copy of the most recent frame; `None` before the first capture.
    pub fn get_frame(&self) -> Option<Frame> {
        self.latest().map(|f| Frame::clone(&f))
    }

    /// The most recent frame without copying pixels.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.shared.frame.peek()
    }

    pub fn camera_state(&self) -> CameraState {
        match self.shared.state.load(Ordering::Acquire) {
            s if s == CameraState::Running as u8 => CameraState::Running,
            s if s == CameraState::Unavailable as u8 => CameraState::Unavailable,
            _ => CameraState::Opening,
        }
    }

    pub fn controller(&self) -> &Arc<AdaptiveStreamController> {
        &self.controller
    }

    /// Stop the acquisition thread and wait for it to exit.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("camera acquisition thread panicked");
            }
        }
    }
}

fn acquisition_thread(
    mut opener: impl ImageSourceOpener,
    config: PipelineConfig,
    shared: &Shared,
    controller: &AdaptiveStreamController,
) {
    let Some(mut source) = open_with_retries(&mut opener, config, shared) else {
        return;
    };
    shared.set_state(CameraState::Running);
    info!(camera = source.id(), "camera acquisition started");

    let mut failures: u32 = 0;
    while shared.running.load(Ordering::Acquire) {
        let started = Instant::now();
        match source.read_frame() {
            Ok(frame) => {
                if failures > 0 {
                    info!(camera = source.id(), failures, "camera capture recovered");
                }
                failures = 0;
                shared.frame.put(Arc::new(frame));
            }
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!(camera = source.id(), error = %e, "frame capture failed; keeping previous frame");
                } else {
                    debug!(camera = source.id(), failures, error = %e, "frame capture failed");
                }
            }
        }
        thread::sleep(controller.frame_period().saturating_sub(started.elapsed()));
    }
    info!(camera = source.id(), "camera acquisition stopped");
}

fn open_with_retries(
    opener: &mut impl ImageSourceOpener,
    config: PipelineConfig,
    shared: &Shared,
) -> Option<Box<dyn ImageSource>> {
    let attempts = config.open_retries.max(1);
    for attempt in 1..=attempts {
        if !shared.running.load(Ordering::Acquire) {
            return None;
        }
        match opener.open() {
            Ok(source) => return Some(source),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "camera open failed");
                if attempt < attempts {
                    thread::sleep(config.open_retry_delay);
                }
            }
        }
    }
    error!(attempts, "camera unavailable; streaming without video");
    shared.set_state(CameraState::Unavailable);
    None
}
