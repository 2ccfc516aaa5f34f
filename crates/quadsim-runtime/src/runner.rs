//! Background simulation thread
//!
//! The simulator lives on a dedicated thread that owns it exclusively.
//! Everything else talks to it through a command channel and observes it
//! through published [`Frame`]s: the latest one in a shared
//! [`SnapshotSlot`] and a bounded feed that drops frames when the consumer
//! lags.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use thiserror::Error;
use tracing::{debug, info, warn};

use quadsim_core::airframe::Airframe;
use quadsim_core::control::{Axis, PidGainsUpdate};
use quadsim_core::simulation::{SetpointUpdate, SimConfig, Simulator, StepReport};
use quadsim_core::ConfigError;

use crate::command::Command;
use crate::snapshot_slot::{Frame, SnapshotSlot};

/// Default observer refresh rate [Hz]
pub const DEFAULT_PUBLISH_RATE: f64 = 60.0;

/// If pacing falls further behind than this, drop the backlog
const MAX_PACING_LAG: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn simulation thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("invalid simulation config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("real time factor {0} gives no usable tick period")]
    InvalidPacing(f64),

    #[error("command queue is full, dropped {0}")]
    QueueFull(&'static str),

    #[error("simulation thread is no longer running")]
    Disconnected,

    #[error("simulation thread panicked")]
    Panicked,
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Physics steps per published frame
    pub publish_every: usize,
    /// Simulated seconds per wall-clock second; 0 runs unpaced
    pub real_time_factor: f64,
    /// Command queue capacity
    pub command_capacity: usize,
    /// Frame feed capacity
    pub feed_capacity: usize,
    /// Thread name
    pub thread_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            publish_every: publish_every_for(DEFAULT_PUBLISH_RATE, SimConfig::default().dt),
            real_time_factor: 1.0,
            command_capacity: 256,
            feed_capacity: 64,
            thread_name: "quadsim-sim".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Publish at roughly `rate` Hz of simulated time.
    pub fn with_publish_rate(mut self, rate: f64, dt: f64) -> Self {
        self.publish_every = publish_every_for(rate, dt);
        self
    }

    /// Publish every `steps` steps.
    pub fn with_publish_every(mut self, steps: usize) -> Self {
        self.publish_every = steps.max(1);
        self
    }

    /// Set the pacing factor.
    pub fn with_real_time_factor(mut self, factor: f64) -> Self {
        self.real_time_factor = factor;
        self
    }

    /// Set the command queue capacity.
    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// Set the frame feed capacity.
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    /// Wall-clock duration of one step, `None` when unpaced
    fn tick_period(&self, dt: f64) -> Result<Option<Duration>, RuntimeError> {
        let factor = self.real_time_factor;
        if !(factor.is_finite() && factor > 0.0) {
            return Ok(None);
        }
        Duration::try_from_secs_f64(dt / factor)
            .ok()
            .filter(|period| Instant::now().checked_add(*period).is_some())
            .map(Some)
            .ok_or(RuntimeError::InvalidPacing(factor))
    }
}

/// Steps between publications for a publish rate: max(1, round(1 / (rate·dt)))
pub fn publish_every_for(rate: f64, dt: f64) -> usize {
    let steps = (1.0 / (rate * dt)).round();
    if steps.is_finite() && steps >= 1.0 {
        steps as usize
    } else {
        1
    }
}

/// Handle for controlling the spawned simulation thread.
///
/// Dropping the handle stops the thread.
pub struct SimulationHandle {
    cmd_tx: Sender<Command>,
    frames_rx: Receiver<Arc<Frame>>,
    slot: Arc<SnapshotSlot>,
    thread: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    /// Queue a command without waiting
    ///
    /// A full queue drops the command and reports [`RuntimeError::QueueFull`].
    pub fn send(&self, command: Command) -> Result<(), RuntimeError> {
        let name = command.name();
        match self.cmd_tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(command = name, "command queue full, dropping command");
                Err(RuntimeError::QueueFull(name))
            }
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected),
        }
    }

    pub fn set_setpoint(&self, update: SetpointUpdate) -> Result<(), RuntimeError> {
        self.send(Command::SetSetpoint(update))
    }

    pub fn update_pid(&self, axis: Axis, gains: PidGainsUpdate) -> Result<(), RuntimeError> {
        self.send(Command::UpdatePid { axis, gains })
    }

    pub fn set_rotor_overrides(
        &self,
        overrides: Vec<(usize, Option<f64>)>,
        replace_all: bool,
    ) -> Result<(), RuntimeError> {
        self.send(Command::SetRotorOverrides {
            overrides,
            replace_all,
        })
    }

    pub fn set_rotor_power(&self, rotor: usize, power: Option<u8>) -> Result<(), RuntimeError> {
        self.send(Command::SetRotorPower { rotor, power })
    }

    pub fn reset(&self) -> Result<(), RuntimeError> {
        self.send(Command::Reset)
    }

    pub fn pause(&self) -> Result<(), RuntimeError> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), RuntimeError> {
        self.send(Command::Resume)
    }

    pub fn request_snapshot(&self) -> Result<(), RuntimeError> {
        self.send(Command::RequestSnapshot)
    }

    /// Most recently published frame (non-blocking)
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Feed of published frames
    pub fn frames(&self) -> &Receiver<Arc<Frame>> {
        &self.frames_rx
    }

    /// Number of frames published so far
    pub fn version(&self) -> u64 {
        self.slot.version()
    }

    /// Frames dropped because the feed was full
    pub fn dropped_frames(&self) -> usize {
        self.slot.feed_dropped()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for the thread to exit
    pub fn shutdown(mut self) -> Result<(), RuntimeError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), RuntimeError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // waits for queue space; fails only when the loop is already gone
        let _ = self.cmd_tx.send(Command::Shutdown);
        thread.join().map_err(|_| RuntimeError::Panicked)
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(%err, "simulation thread did not stop cleanly");
        }
    }
}

/// Spawns the simulation thread.
pub struct SimulationRunner {
    config: RunnerConfig,
}

impl SimulationRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Validate `sim_config`, build the simulator and start stepping it.
    pub fn spawn(
        self,
        airframe: Arc<Airframe>,
        sim_config: SimConfig,
    ) -> Result<SimulationHandle, RuntimeError> {
        sim_config.validate()?;
        let period = self.config.tick_period(sim_config.dt)?;

        let (cmd_tx, cmd_rx) = bounded(self.config.command_capacity.max(1));
        let (frames_tx, frames_rx) = bounded(self.config.feed_capacity.max(1));
        let slot = Arc::new(SnapshotSlot::new());

        let config = self.config;
        let thread_slot = slot.clone();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let simulator = Simulator::new(airframe, sim_config);
                let mut sim_loop = SimLoop {
                    simulator,
                    cmd_rx,
                    frames_tx,
                    slot: thread_slot,
                    publish_every: config.publish_every.max(1),
                    paused: false,
                    resumed: false,
                    step_count: 0,
                    since_publish: 0,
                    reset_latched: false,
                    last_step: None,
                };
                sim_loop.run(period);
            })?;

        Ok(SimulationHandle {
            cmd_tx,
            frames_rx,
            slot,
            thread: Some(thread),
        })
    }
}

/// State owned by the simulation thread
struct SimLoop {
    simulator: Simulator,
    cmd_rx: Receiver<Command>,
    frames_tx: Sender<Arc<Frame>>,
    slot: Arc<SnapshotSlot>,
    publish_every: usize,
    paused: bool,
    /// Set on resume so pacing restarts from the current instant
    resumed: bool,
    step_count: u64,
    since_publish: usize,
    reset_latched: bool,
    last_step: Option<StepReport>,
}

impl SimLoop {
    fn run(&mut self, period: Option<Duration>) {
        info!(
            publish_every = self.publish_every,
            paced = period.is_some(),
            "simulation thread started"
        );
        self.publish();

        let mut next_tick = Instant::now();
        loop {
            if self.drain_commands().is_break() {
                break;
            }
            if std::mem::take(&mut self.resumed) {
                next_tick = Instant::now();
            }

            self.tick();

            if let Some(period) = period {
                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                } else if now - next_tick > MAX_PACING_LAG {
                    next_tick = now;
                }
            }
        }

        info!(steps = self.step_count, "simulation thread stopped");
    }

    /// Apply every queued command; blocks while paused
    fn drain_commands(&mut self) -> ControlFlow<()> {
        loop {
            let command = if self.paused {
                match self.cmd_rx.recv() {
                    Ok(command) => command,
                    Err(_) => return ControlFlow::Break(()),
                }
            } else {
                match self.cmd_rx.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => return ControlFlow::Continue(()),
                    Err(TryRecvError::Disconnected) => return ControlFlow::Break(()),
                }
            };
            if self.apply(command).is_break() {
                return ControlFlow::Break(());
            }
        }
    }

    fn apply(&mut self, command: Command) -> ControlFlow<()> {
        debug!(command = command.name(), "command received");
        match command {
            Command::SetSetpoint(update) => self.simulator.set_setpoint(update),
            Command::UpdatePid { axis, gains } => self.simulator.update_pid(axis, &gains),
            Command::SetRotorOverrides {
                overrides,
                replace_all,
            } => self.simulator.set_rotor_overrides(&overrides, replace_all),
            Command::SetRotorPower { rotor, power } => match power {
                Some(power) => self.simulator.set_rotor_power(rotor, power),
                None => self.simulator.clear_rotor_override(rotor),
            },
            Command::Reset => {
                self.simulator.reset();
                self.publish();
            }
            Command::Pause => {
                if !self.paused {
                    self.paused = true;
                    info!(steps = self.step_count, "simulation paused");
                }
            }
            Command::Resume => {
                if self.paused {
                    self.paused = false;
                    self.resumed = true;
                    info!(steps = self.step_count, "simulation resumed");
                }
            }
            Command::RequestSnapshot => self.publish(),
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn tick(&mut self) {
        let report = self.simulator.step();
        self.step_count += 1;
        self.reset_latched |= report.session_reset;
        self.last_step = Some(report);

        self.since_publish += 1;
        if self.since_publish >= self.publish_every {
            self.publish();
        }
    }

    fn publish(&mut self) {
        let mut snapshot = self.simulator.snapshot();
        snapshot.session_reset = self.reset_latched;
        let frame = Arc::new(Frame {
            step_count: self.step_count,
            snapshot,
            last_step: self.last_step,
        });

        self.slot.publish(frame.clone());
        match self.frames_tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.slot.record_feed_drop(),
            // nobody listens to the feed anymore, the slot still works
            Err(TrySendError::Disconnected(_)) => {}
        }

        self.since_publish = 0;
        self.reset_latched = false;
    }
}
