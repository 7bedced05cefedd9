//! [`AdaptiveStreamController`] – self-tuning JPEG quality and frame rate.
//!
//! Stream loops report every frame as delivered or skipped. Once per window
//! (5 s) the success rate of that window decides the next settings:
//!
//! | success rate | quality | fps |
//! |---|---|---|
//! | `< 0.80` | −5 (floor 40) | −1 (floor 5) |
//! | `> 0.95` and quality below 75 | +3 (cap 75) | +1 (cap 15) |
//! | otherwise | hold | hold |
//!
//! A window with no attempts changes nothing; the window still restarts.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use armlink_types::stats::{StreamSettings, StreamStats};
use tracing::{debug, info};

pub const QUALITY_MIN: u8 = 40;
pub const QUALITY_MAX: u8 = 75;
pub const FPS_MIN: u8 = 5;
pub const FPS_MAX: u8 = 15;

/// Length of one adaptation window.
pub const ADAPT_WINDOW: Duration = Duration::from_secs(5);

const DEGRADE_BELOW: f64 = 0.80;
const IMPROVE_ABOVE: f64 = 0.95;
const QUALITY_STEP_DOWN: u8 = 5;
const QUALITY_STEP_UP: u8 = 3;

/// Compute the settings for the next window from this window's outcome.
///
/// Pure; `maybe_adapt` is the only caller outside tests.
pub fn adjust(current: StreamSettings, delivered: u64, skipped: u64) -> StreamSettings {
    let attempts = delivered + skipped;
    if attempts == 0 {
        return current;
    }
    let success_rate = delivered as f64 / attempts as f64;
    if success_rate < DEGRADE_BELOW {
        StreamSettings {
            quality: current.quality.saturating_sub(QUALITY_STEP_DOWN).max(QUALITY_MIN),
            fps: current.fps.saturating_sub(1).max(FPS_MIN),
        }
    } else if success_rate > IMPROVE_ABOVE && current.quality < QUALITY_MAX {
        StreamSettings {
            quality: current.quality.saturating_add(QUALITY_STEP_UP).min(QUALITY_MAX),
            fps: current.fps.saturating_add(1).min(FPS_MAX),
        }
    } else {
        current
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    delivered: u64,
    skipped: u64,
    bytes: u64,
}

#[derive(Debug)]
struct AdaptiveState {
    settings: StreamSettings,
    window_start: Instant,
    window: Counters,
    total: Counters,
}

/// Shared by every stream consumer and the acquisition loop.
#[derive(Debug)]
pub struct AdaptiveStreamController {
    state: Mutex<AdaptiveState>,
    window: Duration,
}

impl AdaptiveStreamController {
    /// Start from `initial`, clamped into the adaptive range.
    pub fn new(initial: StreamSettings) -> Self {
        Self::with_window(initial, ADAPT_WINDOW)
    }

    pub fn with_window(initial: StreamSettings, window: Duration) -> Self {
        let settings = StreamSettings {
            quality: initial.quality.clamp(QUALITY_MIN, QUALITY_MAX),
            fps: initial.fps.clamp(FPS_MIN, FPS_MAX),
        };
        if settings != initial {
            info!(
                requested_quality = initial.quality,
                requested_fps = initial.fps,
                quality = settings.quality,
                fps = settings.fps,
                "stream settings clamped to adaptive range"
            );
        }
        Self {
            state: Mutex::new(AdaptiveState {
                settings,
                window_start: Instant::now(),
                window: Counters::default(),
                total: Counters::default(),
            }),
            window,
        }
    }

    pub fn record_delivered(&self, bytes: usize) {
        let state = &mut *self.lock();
        for c in [&mut state.window, &mut state.total] {
            c.delivered += 1;
            c.bytes += bytes as u64;
        }
    }

    pub fn record_skipped(&self) {
        self.record_late(0);
    }

    /// A frame that reached the viewer but took longer than one frame period.
    /// Counts as skipped for adaptation; its bytes still count as sent.
    pub fn record_late(&self, bytes: usize) {
        let state = &mut *self.lock();
        for c in [&mut state.window, &mut state.total] {
            c.skipped += 1;
            c.bytes += bytes as u64;
        }
    }

    /// Evaluate the window if it has elapsed.
    ///
    /// Returns the settings in force for the new window, or `None` when the
    /// current window is still open.
    pub fn maybe_adapt(&self) -> Option<StreamSettings> {
        let mut state = self.lock();
        if state.window_start.elapsed() < self.window {
            return None;
        }
        let Counters { delivered, skipped, .. } = state.window;
        let before = state.settings;
        let after = adjust(before, delivered, skipped);
        state.settings = after;
        state.window = Counters::default();
        state.window_start = Instant::now();

        if after != before {
            info!(
                delivered,
                skipped,
                quality = after.quality,
                fps = after.fps,
                "stream settings adapted"
            );
        } else {
            debug!(delivered, skipped, "stream settings unchanged");
        }
        Some(after)
    }

    pub fn settings(&self) -> StreamSettings {
        self.lock().settings
    }

    /// Target period between frames at the current fps.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / u32::from(self.settings().fps.max(1))
    }

    pub fn stats(&self) -> StreamStats {
        let state = self.lock();
        StreamStats {
            fps: state.settings.fps,
            quality: state.settings.quality,
            frames_sent: state.window.delivered,
            frames_skipped: state.window.skipped,
            bytes_sent: state.window.bytes,
            total_frames_sent: state.total.delivered,
            total_frames_skipped: state.total.skipped,
            total_bytes_sent: state.total.bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AdaptiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AdaptiveStreamController {
    fn default() -> Self {
        Self::new(StreamSettings { quality: 65, fps: 12 })
    }
}
