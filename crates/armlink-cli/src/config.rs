//! Configuration – reads/writes `~/.armlink/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use armlink_kernel::CoalescerConfig;
use armlink_types::stats::StreamSettings;
use armlink_vision::PipelineConfig;

/// Camera section of the config file (`[camera]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// V4L2 device index (`/dev/video<N>`).
    #[serde(default)]
    pub device: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Initial target frame rate; adapted at runtime within 5-15.
    #[serde(default = "default_fps")]
    pub fps: u8,
    /// Initial JPEG quality; adapted at runtime within 40-75.
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_open_retries")]
    pub open_retries: u32,
    #[serde(default = "default_open_retry_delay_ms")]
    pub open_retry_delay_ms: u64,
}

/// Persisted configuration stored in `~/.armlink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP/WebSocket listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serial device of the arm controller. Reserved for a serial
    /// `ArmDriver`; the simulated bus ignores it.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    /// Baud rate for `serial_port`. Reserved like `serial_port`.
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Speed passed with every angle write (0-100).
    #[serde(default = "default_angle_speed")]
    pub angle_speed: u8,

    /// Speed passed with every gripper write (0-100).
    #[serde(default = "default_gripper_speed")]
    pub gripper_speed: u8,

    #[serde(default = "default_drain_period_ms")]
    pub drain_period_ms: u64,

    /// Seconds of silence from every client before the arm goes safe.
    #[serde(default = "default_heartbeat_timeout_s")]
    pub heartbeat_timeout_s: f64,

    /// Artificial per-call delay of the simulated arm bus.
    #[serde(default)]
    pub sim_bus_latency_ms: u64,

    #[serde(default)]
    pub camera: CameraConfig,
}

fn default_port() -> u16 {
    8080
}
fn default_serial_port() -> String {
    "/dev/ttyAMA0".to_string()
}
fn default_baud() -> u32 {
    1_000_000
}
fn default_angle_speed() -> u8 {
    100
}
fn default_gripper_speed() -> u8 {
    80
}
fn default_drain_period_ms() -> u64 {
    25
}
fn default_heartbeat_timeout_s() -> f64 {
    5.0
}
fn default_width() -> u32 {
    480
}
fn default_height() -> u32 {
    360
}
fn default_fps() -> u8 {
    12
}
fn default_quality() -> u8 {
    65
}
fn default_open_retries() -> u32 {
    3
}
fn default_open_retry_delay_ms() -> u64 {
    1000
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            quality: default_quality(),
            open_retries: default_open_retries(),
            open_retry_delay_ms: default_open_retry_delay_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            serial_port: default_serial_port(),
            baud: default_baud(),
            angle_speed: default_angle_speed(),
            gripper_speed: default_gripper_speed(),
            drain_period_ms: default_drain_period_ms(),
            heartbeat_timeout_s: default_heartbeat_timeout_s(),
            sim_bus_latency_ms: 0,
            camera: CameraConfig::default(),
        }
    }
}

impl Config {
    pub fn coalescer(&self) -> CoalescerConfig {
        CoalescerConfig {
            drain_period: Duration::from_millis(self.drain_period_ms.max(1)),
            angle_speed: self.angle_speed,
            gripper_speed: self.gripper_speed,
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        // A negative or NaN timeout would make every client stale at once.
        Duration::try_from_secs_f64(self.heartbeat_timeout_s)
            .unwrap_or(Duration::from_secs_f64(default_heartbeat_timeout_s()))
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            quality: self.camera.quality,
            fps: self.camera.fps,
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            open_retries: self.camera.open_retries,
            open_retry_delay: Duration::from_millis(self.camera.open_retry_delay_ms),
        }
    }

    pub fn camera_device(&self) -> String {
        format!("/dev/video{}", self.camera.device)
    }
}

/// Path of the config file: `$ARMLINK_CONFIG` if set, else
/// `~/.armlink/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("ARMLINK_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".armlink").join("config.toml")
}

/// Load the config from disk with environment overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the config at a specific path. No environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ARMLINK_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `ARMLINK_PORT` | `port` |
/// | `ARMLINK_SERIAL_PORT` | `serial_port` |
/// | `ARMLINK_HEARTBEAT_TIMEOUT_S` | `heartbeat_timeout_s` |
/// | `ARMLINK_CAMERA_DEVICE` | `camera.device` |
/// | `ARMLINK_JPEG_QUALITY` | `camera.quality` |
/// | `ARMLINK_FPS` | `camera.fps` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARMLINK_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("ARMLINK_SERIAL_PORT") {
        cfg.serial_port = v;
    }
    if let Ok(v) = std::env::var("ARMLINK_HEARTBEAT_TIMEOUT_S")
        && let Ok(secs) = v.parse::<f64>()
        && secs.is_finite()
        && secs > 0.0
    {
        cfg.heartbeat_timeout_s = secs;
    }
    if let Ok(v) = std::env::var("ARMLINK_CAMERA_DEVICE")
        && let Ok(device) = v.parse::<u32>()
    {
        cfg.camera.device = device;
    }
    if let Ok(v) = std::env::var("ARMLINK_JPEG_QUALITY")
        && let Ok(quality) = v.parse::<u8>()
    {
        cfg.camera.quality = quality;
    }
    if let Ok(v) = std::env::var("ARMLINK_FPS")
        && let Ok(fps) = v.parse::<u8>()
    {
        cfg.camera.fps = fps;
    }
}

/// Save the config to disk, creating `~/.armlink/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
