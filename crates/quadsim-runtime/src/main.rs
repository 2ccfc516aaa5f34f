//! quadsim - interactive quadrotor flight simulator

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quadsim_core::airframe::{Airframe, AirframeSpec};
use quadsim_core::dynamics::Propulsion;
use quadsim_core::math::deg_to_rad;
use quadsim_core::simulation::{SetpointUpdate, SimConfig};
use quadsim_runtime::{Frame, RunnerConfig, SimulationRunner, DEFAULT_PUBLISH_RATE};

/// How long to wait for a frame before checking the thread is alive
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "quadsim")]
#[command(about = "Interactive quadrotor flight simulator")]
#[command(version)]
struct Cli {
    /// Airframe document (JSON); the built-in 650 mm X-frame when omitted
    #[arg(long)]
    airframe: Option<PathBuf>,

    /// Simulation config (JSON); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time step [s]
    #[arg(long)]
    dt: Option<f64>,

    /// Session length [s]
    #[arg(long)]
    session_duration: Option<f64>,

    /// Normalized throttle in [0, 1]
    #[arg(long, conflicts_with = "hover")]
    throttle: Option<f64>,

    /// Use the hover throttle of the airframe
    #[arg(long)]
    hover: bool,

    /// Roll setpoint [deg]
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    roll: f64,

    /// Pitch setpoint [deg]
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pitch: f64,

    /// Yaw setpoint [deg]
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    yaw: f64,

    /// Simulated time to run for [s]
    #[arg(long, default_value_t = 5.0)]
    run_for: f64,

    /// Frames per simulated second
    #[arg(long, default_value_t = DEFAULT_PUBLISH_RATE)]
    publish_rate: f64,

    /// Simulated seconds per wall-clock second, 0 runs as fast as possible
    #[arg(long, default_value_t = 1.0)]
    real_time_factor: f64,

    /// Seed for reproducible sensor noise
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let spec = match &cli.airframe {
        Some(path) => AirframeSpec::from_path(path)
            .with_context(|| format!("loading airframe {}", path.display()))?,
        None => AirframeSpec::default(),
    };
    let airframe = Arc::new(spec.to_params().context("deriving airframe parameters")?);

    let mut sim_config = match &cli.config {
        Some(path) => SimConfig::from_path(path)
            .with_context(|| format!("loading simulation config {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(dt) = cli.dt {
        sim_config.dt = dt;
    }
    if let Some(duration) = cli.session_duration {
        sim_config.session_duration = duration;
    }
    if cli.seed.is_some() {
        sim_config.seed = cli.seed;
    }
    if !(cli.run_for.is_finite() && cli.run_for > 0.0) {
        bail!("--run-for must be positive, got {}", cli.run_for);
    }

    let throttle = if cli.hover {
        hover_throttle(&airframe)
    } else {
        cli.throttle.unwrap_or(0.0)
    };

    let runner_config = RunnerConfig::default()
        .with_publish_rate(cli.publish_rate, sim_config.dt)
        .with_real_time_factor(cli.real_time_factor);
    let handle = SimulationRunner::new(runner_config)
        .spawn(airframe, sim_config)
        .context("starting simulation")?;

    handle.set_setpoint(SetpointUpdate {
        roll: Some(deg_to_rad(cli.roll)),
        pitch: Some(deg_to_rad(cli.pitch)),
        yaw: Some(deg_to_rad(cli.yaw)),
        throttle: Some(throttle),
    })?;
    info!(throttle, roll = cli.roll, pitch = cli.pitch, yaw = cli.yaw, "setpoint applied");

    loop {
        let frame = match handle.frames().recv_timeout(FRAME_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) if handle.is_running() => continue,
            Err(_) => bail!("simulation thread stopped unexpectedly"),
        };
        match cli.format {
            OutputFormat::Text => println!("{}", summary(&frame)),
            OutputFormat::Json => println!("{}", frame.to_json()?),
        }
        if frame.snapshot.timeline.absolute >= cli.run_for {
            break;
        }
    }

    let dropped = handle.dropped_frames();
    handle.shutdown().context("stopping simulation")?;
    info!(dropped_frames = dropped, "done");
    Ok(())
}

fn hover_throttle(airframe: &Airframe) -> f64 {
    airframe.weight() / Propulsion::new(airframe).max_collective().max(1e-6)
}

/// One-line text rendering of a frame
fn summary(frame: &Frame) -> String {
    let s = &frame.snapshot;
    let att = s.state.euler_deg;
    let est = s.estimate.euler().to_degrees();
    let rpm: Vec<String> = s.rotors.iter().map(|r| format!("{:5.0}", r.rpm)).collect();
    format!(
        "t={:7.3}s session={} alt={:6.2}m att=({:6.1},{:6.1},{:6.1})° est=({:6.1},{:6.1},{:6.1})° rpm=[{}]{}",
        s.timeline.absolute,
        s.timeline.session_id,
        s.state.position.z,
        att.roll,
        att.pitch,
        att.yaw,
        est.roll,
        est.pitch,
        est.yaw,
        rpm.join(" "),
        if s.session_reset { " (session reset)" } else { "" },
    )
}
