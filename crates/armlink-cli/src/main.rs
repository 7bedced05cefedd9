//! `armlink` – remote control server for a six-joint arm with gripper and
//! camera.
//!
//! 1. Loads `~/.armlink/config.toml` (writes the defaults on first run) and
//!    applies `ARMLINK_*` overrides.
//! 2. Wires the arm coalescer, heartbeat monitor and camera pipeline over the
//!    simulated drivers.
//! 3. Serves the control channel, video and diagnostics until **Ctrl-C**, then
//!    stops every loop.

mod config;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use armlink_cockpit::{AppState, CockpitServer};
use armlink_hal::{ImageSource, SimArm, SimCamera};
use armlink_kernel::heartbeat::MONITOR_PERIOD;
use armlink_kernel::{ArmCoalescer, Failsafe, HeartbeatMonitor};
use armlink_types::ArmError;
use armlink_vision::{AdaptiveStreamController, CameraPipeline};
use colored::Colorize;
use tracing::{error, info, warn};

use config::Config;

fn main() -> ExitCode {
    // The OTLP exporter must be built before the runtime exists.
    let guard = telemetry::init_tracing("armlink");

    print_banner();
    let cfg = load_config();
    print_summary(&cfg, guard.exporting());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run(cfg)) {
        Ok(()) => {
            println!("{}", "  ✓ Stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "armlink stopped");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: Config) -> Result<(), String> {
    let arm = SimArm::new().with_latency(Duration::from_millis(cfg.sim_bus_latency_ms));
    let coalescer = Arc::new(ArmCoalescer::new(Box::new(arm), cfg.coalescer()));
    let drain = coalescer
        .spawn_drain_loop()
        .map_err(|e| format!("failed to spawn drain loop: {e}"))?;

    let heartbeat = Arc::new(HeartbeatMonitor::new(cfg.heartbeat_timeout()));
    let monitor = heartbeat.spawn_monitor(Arc::clone(&coalescer) as Arc<dyn Failsafe>, MONITOR_PERIOD);

    let controller = Arc::new(AdaptiveStreamController::new(cfg.stream_settings()));
    let (device, width, height) = (cfg.camera_device(), cfg.camera.width, cfg.camera.height);
    let opener = move || -> Result<Box<dyn ImageSource>, ArmError> {
        Ok(Box::new(SimCamera::new(device.clone(), width, height)))
    };
    let camera = Arc::new(
        CameraPipeline::start(opener, cfg.pipeline(), controller)
            .map_err(|e| format!("failed to spawn camera thread: {e}"))?,
    );

    let state = Arc::new(AppState::new(
        Arc::clone(&coalescer),
        Arc::clone(&heartbeat),
        Arc::clone(&camera),
    ));
    let server = CockpitServer::new(state).with_port(cfg.port);
    println!(
        "  Cockpit listening on {}\n",
        format!("http://localhost:{}", cfg.port).bold().cyan()
    );

    let result = tokio::select! {
        served = server.run() => served.map_err(|e| e.to_string()),
        signal = tokio::signal::ctrl_c() => {
            println!();
            println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
            signal.map_err(|e| format!("failed to listen for Ctrl-C: {e}"))
        }
    };

    monitor.abort();
    coalescer.shutdown();
    let joined = tokio::task::spawn_blocking(move || {
        camera.shutdown();
        drain.join().is_ok()
    })
    .await;
    if !matches!(joined, Ok(true)) {
        warn!("drain loop did not stop cleanly");
    }
    info!("all loops stopped");
    result
}

fn load_config() -> Config {
    let path = config::config_path();
    match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Console output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __   ___  __  __  _    ___ _  _ _  __"#.bold().cyan());
    println!("{}", r#"  /_\ | _ \|  \/  || |  |_ _| \| | |/ /"#.bold().cyan());
    println!("{}", r#" / _ \|   /| |\/| || |__ | || .` | ' < "#.bold().cyan());
    println!("{}", r#"/_/ \_\_|_\|_|  |_||____|___|_|\_|_|\_\"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "armlink".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Remote arm control and live video");
    println!();
}

fn print_summary(cfg: &Config, otlp: bool) {
    println!(
        "  Arm bus     {} {}",
        "sim".bold(),
        format!("({} @ {} baud not opened)", cfg.serial_port, cfg.baud).dimmed()
    );
    println!(
        "  Camera      {} {}x{}",
        cfg.camera_device().bold(),
        cfg.camera.width,
        cfg.camera.height
    );
    println!(
        "  Stream      quality {} / {} fps (adaptive)",
        cfg.camera.quality, cfg.camera.fps
    );
    println!(
        "  Heartbeat   {:.1}s timeout, drain every {}ms",
        cfg.heartbeat_timeout().as_secs_f64(),
        cfg.drain_period_ms
    );
    println!(
        "  Tracing     {}",
        if otlp { "OTLP export on" } else { "local only" }
    );
    println!();
}
