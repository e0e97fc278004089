//! Headless controller tuner.
//!
//! Drives a flight or drive controller through a scripted input sequence
//! against a synthetic terrain, printing CSV telemetry to stdout and a
//! summary of the run to stderr.
//!
//! Run with: cargo run -p globecam --bin controller-tuning -- [options]
//! Example: cargo run -p globecam --bin controller-tuning -- --mode drive --steer 1 --steer-after 2

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use glam::DVec3;
use serde::de::DeserializeOwned;

use globecam::{
    CameraController, CameraMode, CarTuning, ConfigOverrides, Geodetic, KeyCode, ModeSelector,
    geo::geodetic_to_ecef,
    sim::{HeadlessHost, HeadlessScene, LoadingTerrain, NoisyTerrain, level_pose},
    telemetry::{CsvTelemetry, TelemetrySnapshot, emit_telemetry_to, reset_telemetry_to},
};

#[derive(Parser)]
#[command(about = "Headless tuner for the globe camera controllers")]
struct CliArgs {
    /// Controller to run.
    #[arg(long, value_enum, default_value_t = CameraMode::Drive)]
    mode: CameraMode,

    /// Simulated duration in seconds.
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Frame delta in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// Forward input: 1 holds W, -1 holds S, 0 holds neither.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true,
          value_parser = clap::value_parser!(i8).range(-1..=1))]
    throttle: i8,

    /// Release the forward input after this many seconds.
    #[arg(long)]
    release_after: Option<f64>,

    /// Steering input: 1 holds D, -1 holds A, 0 holds neither.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true,
          value_parser = clap::value_parser!(i8).range(-1..=1))]
    steer: i8,

    /// Start steering after this many seconds.
    #[arg(long, default_value_t = 0.0)]
    steer_after: f64,

    /// Hold the boost key.
    #[arg(long)]
    boost: bool,

    /// Starting longitude in degrees.
    #[arg(long, default_value_t = -74.0, allow_negative_numbers = true)]
    lon: f64,

    /// Starting latitude in degrees.
    #[arg(long, default_value_t = 40.7, allow_negative_numbers = true)]
    lat: f64,

    /// Starting height above the ellipsoid in meters.
    #[arg(long, default_value_t = 200.0)]
    altitude: f64,

    /// Starting heading in degrees clockwise from north.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    heading: f64,

    /// Terrain height above the ellipsoid in meters.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    terrain_height: f64,

    /// Amplitude of per-sample terrain jitter in meters.
    #[arg(long, default_value_t = 0.0)]
    terrain_noise: f64,

    /// Seed for the terrain jitter.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of initial terrain queries that report "not loaded".
    #[arg(long, default_value_t = 0)]
    loading_queries: u32,

    /// JSON file with controller config overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with car tuning overrides.
    #[arg(long)]
    car: Option<PathBuf>,

    /// Emit a CSV row every N frames.
    #[arg(long, default_value_t = 1)]
    every: u32,
}

/// Statistics accumulated over the run.
#[derive(Default)]
struct Summary {
    peak_speed: f64,
    time_to_90_percent: Option<f64>,
    min_altitude: f64,
    max_altitude: f64,
    ungrounded_frames: u32,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| format!("failed to parse {}: {err}", path.display()))
}

fn set_key(host: &mut HeadlessHost, key: KeyCode, held: bool) {
    if held {
        host.press(key);
    } else {
        host.release(key);
    }
}

/// Hold the scripted keys for time `t`.
fn apply_script(host: &mut HeadlessHost, args: &CliArgs, t: f64) {
    let forward = if args.release_after.is_some_and(|release| t >= release) {
        0
    } else {
        args.throttle
    };
    let steer = if t >= args.steer_after { args.steer } else { 0 };

    set_key(host, KeyCode::KeyW, forward > 0);
    set_key(host, KeyCode::KeyS, forward < 0);
    set_key(host, KeyCode::KeyD, steer > 0);
    set_key(host, KeyCode::KeyA, steer < 0);
    set_key(host, KeyCode::ShiftLeft, args.boost);
}

fn build_host(args: &CliArgs) -> HeadlessHost {
    let position = geodetic_to_ecef(Geodetic::from_degrees(args.lon, args.lat, args.altitude));
    let scene = HeadlessScene::new(level_pose(position, args.heading.to_radians()));
    let terrain = NoisyTerrain::new(args.terrain_height, args.terrain_noise, args.seed);
    if args.loading_queries > 0 {
        HeadlessHost::new(scene, LoadingTerrain::new(terrain, args.loading_queries))
    } else {
        HeadlessHost::new(scene, terrain)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn run(args: &CliArgs) -> Result<(), String> {
    if !(args.dt.is_finite() && args.dt > 0.0) {
        return Err(format!("--dt must be positive, got {}", args.dt));
    }

    let overrides: ConfigOverrides = match &args.config {
        Some(path) => read_json(path)?,
        None => ConfigOverrides::default(),
    };
    let car: CarTuning = match &args.car {
        Some(path) => read_json(path)?,
        None => CarTuning::default(),
    };

    let mut host = build_host(args);
    let mut selector = ModeSelector::new(overrides.clone(), overrides, car);
    selector
        .switch_to(args.mode, &mut host.context())
        .map_err(|err| err.to_string())?;

    let Some(max_speed) = selector
        .active()
        .map(|active| active.core().config().max_speed)
    else {
        return Err("no controller is active".to_owned());
    };
    let start = host
        .scene
        .pose()
        .map_or(DVec3::ZERO, |pose| pose.position);

    eprintln!("# Mode: {:?}", args.mode);
    eprintln!("# Duration: {:.2}s at dt={:.5}", args.duration, args.dt);

    let mut output = CsvTelemetry::new(std::io::stdout().lock());
    reset_telemetry_to(&mut output).map_err(|err| format!("failed to write telemetry: {err}"))?;

    let mut summary = Summary {
        min_altitude: f64::MAX,
        max_altitude: f64::MIN,
        ..Summary::default()
    };
    let frames = (args.duration / args.dt).ceil() as u64;
    let every = u64::from(args.every.max(1));

    for frame in 0..frames {
        let t = frame as f64 * args.dt;
        apply_script(&mut host, args, t);
        selector.update(&mut host.context(), args.dt);

        let Some(active) = selector.active() else {
            break;
        };
        let telemetry = active.telemetry();
        let elapsed = t + args.dt;

        summary.peak_speed = summary.peak_speed.max(telemetry.speed.abs());
        if summary.time_to_90_percent.is_none() && telemetry.speed.abs() >= 0.9 * max_speed {
            summary.time_to_90_percent = Some(elapsed);
        }
        summary.min_altitude = summary.min_altitude.min(telemetry.altitude);
        summary.max_altitude = summary.max_altitude.max(telemetry.altitude);
        if !telemetry.grounded {
            summary.ungrounded_frames += 1;
        }

        if frame % every == 0 {
            let input = active.core().input_state();
            let snapshot = TelemetrySnapshot {
                elapsed,
                dt: args.dt,
                throttle: input.axis(&[KeyCode::KeyW], &[KeyCode::KeyS]),
                steer: input.axis(&[KeyCode::KeyD], &[KeyCode::KeyA]),
                boost: input.pressed(KeyCode::ShiftLeft),
                position: active.camera_state().position,
                controller: telemetry,
            };
            emit_telemetry_to(&snapshot, &mut output)
                .map_err(|err| format!("failed to write telemetry: {err}"))?;
        }
    }

    output
        .into_inner()
        .map_err(|err| format!("failed to write telemetry: {err}"))?;

    let end = selector
        .active()
        .map_or(start, |active| active.camera_state().position);
    selector.shutdown(&mut host.context());

    eprintln!();
    eprintln!("# === SUMMARY ===");
    eprintln!("# Configured max speed: {max_speed:.2} m/s");
    eprintln!("# Peak speed: {:.2} m/s", summary.peak_speed);
    match summary.time_to_90_percent {
        Some(time) => eprintln!("# Time to 90% of max speed: {time:.2}s"),
        None => eprintln!("# Time to 90% of max speed: not reached"),
    }
    eprintln!("# Straight-line distance: {:.2} m", (end - start).length());
    eprintln!(
        "# Altitude range: {:.3} .. {:.3} m (spread {:.3} m)",
        summary.min_altitude,
        summary.max_altitude,
        summary.max_altitude - summary.min_altitude
    );
    eprintln!("# Ungrounded frames: {}", summary.ungrounded_frames);
    eprintln!("# Render requests: {}", host.scene.render_requests());
    Ok(())
}

fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("# ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
