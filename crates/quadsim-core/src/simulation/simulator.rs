//! Main simulator
//!
//! Runs the fixed-step control loop: sense, estimate, control, mix, command
//! rotors, integrate physics, then advance the session timeline.

use std::sync::Arc;

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::SimConfig;
use super::sensors::{SensorModel, SensorReading};
use super::snapshot::{AirframeSummary, RotorSnapshot, Snapshot, VehicleSnapshot};
use crate::airframe::Airframe;
use crate::control::{AttitudePid, Axis, Mixer, PidGainsUpdate};
use crate::dynamics::{Propulsion, QuadrotorDynamics, QuadrotorState, StepForces};
use crate::estimation::{AttitudeEstimate, ComplementaryFilter};
use crate::math::{euler_from_quaternion, wrap_pi, EulerAngles};
use crate::ROTOR_COUNT;

/// Desired attitude [rad] and normalized throttle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// Fraction of maximum collective thrust, in [0, 1]
    pub throttle: f64,
}

/// Partial setpoint change, absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetpointUpdate {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub throttle: Option<f64>,
}

impl SetpointUpdate {
    pub fn attitude(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            roll: Some(roll),
            pitch: Some(pitch),
            yaw: Some(yaw),
            throttle: None,
        }
    }

    pub fn throttle(throttle: f64) -> Self {
        Self {
            throttle: Some(throttle),
            ..Default::default()
        }
    }
}

/// Session clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Time since the current session started [s], in [0, duration)
    pub elapsed: f64,
    /// Session length [s]
    pub duration: f64,
    pub session_id: u64,
    /// Time since the simulator was created [s]
    pub absolute: f64,
}

impl Timeline {
    pub fn new(duration: f64) -> Self {
        Self {
            elapsed: 0.0,
            duration,
            session_id: 0,
            absolute: 0.0,
        }
    }

    /// Advance by `dt`, returning true when a new session starts
    pub fn advance(&mut self, dt: f64) -> bool {
        self.elapsed += dt;
        self.absolute += dt;
        if self.elapsed >= self.duration {
            self.session_id += 1;
            self.elapsed = 0.0;
            return true;
        }
        false
    }
}

/// Everything computed during one simulation step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub reading: SensorReading,
    pub estimate: AttitudeEstimate,
    /// Wrapped setpoint minus estimate [rad]
    pub errors: EulerAngles,
    /// PID torque demand [N·m] (body frame)
    pub torque_demand: Vector3<f64>,
    /// Mixer thrust targets [N]
    pub thrust_targets: [f64; ROTOR_COUNT],
    /// Rotor speed commands sent to the motors [rpm]
    pub rotor_commands: [f64; ROTOR_COUNT],
    pub overrides: [Option<f64>; ROTOR_COUNT],
    pub timeline: Timeline,
    /// A session rollover happened at the end of this step
    pub session_reset: bool,
    pub forces: StepForces,
}

/// Quadrotor flight simulator
pub struct Simulator {
    airframe: Arc<Airframe>,
    config: SimConfig,
    dynamics: QuadrotorDynamics,
    mixer: Mixer,
    state: QuadrotorState,
    estimator: ComplementaryFilter,
    sensors: SensorModel,
    pid: AttitudePid,
    setpoint: Setpoint,
    overrides: [Option<f64>; ROTOR_COUNT],
    rotor_commands: [f64; ROTOR_COUNT],
    timeline: Timeline,
    rng: StdRng,
    max_thrust_per_rotor: f64,
    max_collective: f64,
    hover_throttle: f64,
    last_reading: SensorReading,
    last_estimate: AttitudeEstimate,
    last_session_reset: bool,
}

impl Simulator {
    /// Create a new simulator
    ///
    /// The configuration is expected to have passed [`SimConfig::validate`].
    pub fn new(airframe: Arc<Airframe>, config: SimConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let propulsion = Propulsion::new(&airframe);
        let max_thrust_per_rotor = propulsion.max_thrust_per_rotor();
        let max_collective = propulsion.max_collective();
        let hover_throttle = airframe.weight() / max_collective.max(1e-6);

        let dynamics = QuadrotorDynamics::new(airframe.clone(), config.physics);
        let mixer = Mixer::from_airframe(&airframe);
        let sensors = SensorModel::new(&config.sensors, airframe.field_height, &mut rng);
        let state = QuadrotorState::default();
        let mut estimator = ComplementaryFilter::new(config.filter_alpha);
        estimator.reset(state.orientation);

        info!(
            dt = config.dt,
            session_duration = config.session_duration,
            filter_alpha = config.filter_alpha,
            hover_throttle,
            "simulator created"
        );

        Self {
            pid: AttitudePid::new(&config.pid),
            timeline: Timeline::new(config.session_duration),
            airframe,
            config,
            dynamics,
            mixer,
            state,
            estimator,
            sensors,
            setpoint: Setpoint::default(),
            overrides: [None; ROTOR_COUNT],
            rotor_commands: [0.0; ROTOR_COUNT],
            rng,
            max_thrust_per_rotor,
            max_collective,
            hover_throttle,
            last_reading: SensorReading::default(),
            last_estimate: AttitudeEstimate::default(),
            last_session_reset: false,
        }
    }

    /// Run one control and physics step
    pub fn step(&mut self) -> StepReport {
        let dt = self.config.dt;

        let reading = self.sensors.measure(&self.state, self.airframe.gravity);
        let estimate = self.estimator.update(&reading, dt);

        let errors = EulerAngles::new(
            wrap_pi(self.setpoint.roll - estimate.roll),
            wrap_pi(self.setpoint.pitch - estimate.pitch),
            wrap_pi(self.setpoint.yaw - estimate.yaw),
        );
        let torque_demand = Vector3::new(
            self.pid.roll.update(errors.roll, dt),
            self.pid.pitch.update(errors.pitch, dt),
            self.pid.yaw.update(errors.yaw, dt),
        );

        let collective = self.setpoint.throttle.clamp(0.0, 1.0) * self.max_collective;
        let thrust_targets = self.mixer.mix(&torque_demand, collective);

        let propulsion = Propulsion::new(&self.airframe);
        let max_rpm = self.airframe.max_rpm;
        for (i, command) in self.rotor_commands.iter_mut().enumerate() {
            *command = match self.overrides[i] {
                Some(rpm) => rpm.clamp(0.0, max_rpm),
                None => propulsion
                    .rpm_from_thrust(thrust_targets[i].min(self.max_thrust_per_rotor))
                    .min(max_rpm),
            };
        }
        let rotor_commands = self.rotor_commands;

        let forces = self.dynamics.step(&mut self.state, &rotor_commands, dt);

        self.last_reading = reading;
        self.last_estimate = estimate;

        let session_reset = self.timeline.advance(dt);
        if session_reset {
            info!(
                session_id = self.timeline.session_id,
                absolute = self.timeline.absolute,
                "session duration reached, resetting vehicle"
            );
            self.reset_vehicle();
        }

        self.last_session_reset = session_reset;

        StepReport {
            reading,
            estimate,
            errors,
            torque_demand,
            thrust_targets,
            rotor_commands,
            overrides: self.overrides,
            timeline: self.timeline,
            session_reset,
            forces,
        }
    }

    /// Advance `n` steps, returning the last report
    pub fn run_steps(&mut self, n: usize) -> Option<StepReport> {
        (0..n).map(|_| self.step()).last()
    }

    /// Put the vehicle back on the ground at rest
    ///
    /// Rebuilds physics, estimator and sensor biases and clears controller
    /// memory. The timeline and rotor overrides are kept.
    pub fn reset(&mut self) {
        debug!(session_id = self.timeline.session_id, "explicit reset");
        self.reset_vehicle();
        self.last_session_reset = false;
    }

    fn reset_vehicle(&mut self) {
        self.state = QuadrotorState::default();
        self.estimator = ComplementaryFilter::new(self.config.filter_alpha);
        self.estimator.reset(self.state.orientation);
        self.sensors = SensorModel::new(&self.config.sensors, self.airframe.field_height, &mut self.rng);
        self.rotor_commands = [0.0; ROTOR_COUNT];
        self.pid.reset();
        self.last_reading = SensorReading::default();
        self.last_estimate = AttitudeEstimate::default();
    }

    /// Apply the present fields of a setpoint update
    ///
    /// Non-finite values are ignored; throttle is clamped to [0, 1].
    pub fn set_setpoint(&mut self, update: SetpointUpdate) {
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());

        if let Some(roll) = finite(update.roll) {
            self.setpoint.roll = roll;
        }
        if let Some(pitch) = finite(update.pitch) {
            self.setpoint.pitch = pitch;
        }
        if let Some(yaw) = finite(update.yaw) {
            self.setpoint.yaw = yaw;
        }
        if let Some(throttle) = finite(update.throttle) {
            self.setpoint.throttle = throttle.clamp(0.0, 1.0);
        }
        debug!(setpoint = ?self.setpoint, "setpoint updated");
    }

    /// Change the gains of one axis, keeping its accumulated state
    pub fn update_pid(&mut self, axis: Axis, gains: &PidGainsUpdate) {
        self.pid[axis].set_gains(gains);
        debug!(axis = axis.name(), gains = ?self.pid[axis].gains, "pid gains updated");
    }

    /// Set or clear per-rotor speed overrides [rpm]
    ///
    /// With `replace_all` every override is cleared first. Entries with an
    /// out-of-range index or a non-finite value are dropped; values are
    /// clamped to [0, max rpm].
    pub fn set_rotor_overrides(&mut self, overrides: &[(usize, Option<f64>)], replace_all: bool) {
        if replace_all {
            self.overrides = [None; ROTOR_COUNT];
        }

        for &(index, value) in overrides {
            if index >= ROTOR_COUNT {
                warn!(index, "ignoring override for unknown rotor");
                continue;
            }
            match value {
                None => self.overrides[index] = None,
                Some(rpm) if rpm.is_finite() => {
                    self.overrides[index] = Some(rpm.clamp(0.0, self.airframe.max_rpm));
                }
                Some(rpm) => warn!(index, rpm, "ignoring non-finite rotor override"),
            }
        }
        debug!(overrides = ?self.overrides, replace_all, "rotor overrides updated");
    }

    /// Override one rotor on the 0-255 power scale
    pub fn set_rotor_power(&mut self, index: usize, power: u8) {
        let rpm = power_to_rpm(power, self.airframe.max_rpm);
        self.set_rotor_overrides(&[(index, Some(rpm))], false);
    }

    pub fn clear_rotor_override(&mut self, index: usize) {
        self.set_rotor_overrides(&[(index, None)], false);
    }

    pub fn clear_all_overrides(&mut self) {
        self.set_rotor_overrides(&[], true);
    }

    /// Deep copy of everything an observer may want to display
    pub fn snapshot(&self) -> Snapshot {
        let euler = euler_from_quaternion(&self.state.orientation);
        let rotors = std::array::from_fn(|i| RotorSnapshot {
            command_rpm: self.rotor_commands[i],
            rpm: self.state.rotors[i].rpm,
            thrust: self.state.rotors[i].thrust,
            override_rpm: self.overrides[i],
        });

        Snapshot {
            dt: self.config.dt,
            mass: self.airframe.mass,
            gravity: self.airframe.gravity,
            hover_throttle: self.hover_throttle,
            setpoint: self.setpoint,
            timeline: self.timeline,
            pid: self.pid.gains(),
            state: VehicleSnapshot {
                position: self.state.position,
                velocity: self.state.velocity,
                angular_velocity: self.state.angular_velocity,
                quaternion: self.state.orientation,
                euler,
                euler_deg: euler.to_degrees(),
                on_ground: self.state.on_ground,
            },
            estimate: self.last_estimate,
            sensors: self.last_reading,
            rotors,
            airframe: AirframeSummary {
                mass: self.airframe.mass,
                inertia: self.airframe.inertia,
                wheelbase: self.airframe.wheelbase,
                yaw_torque_factor: self.airframe.yaw_torque_factor,
                hover_rpm: self.airframe.hover_rpm,
                max_rpm: self.airframe.max_rpm,
                max_collective: self.max_collective,
            },
            session_reset: self.last_session_reset,
        }
    }

    pub fn airframe(&self) -> &Arc<Airframe> {
        &self.airframe
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn dt(&self) -> f64 {
        self.config.dt
    }

    pub fn state(&self) -> &QuadrotorState {
        &self.state
    }

    pub fn setpoint(&self) -> &Setpoint {
        &self.setpoint
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn overrides(&self) -> &[Option<f64>; ROTOR_COUNT] {
        &self.overrides
    }

    pub fn rotor_commands(&self) -> &[f64; ROTOR_COUNT] {
        &self.rotor_commands
    }

    pub fn pid(&self) -> &AttitudePid {
        &self.pid
    }

    /// Throttle that balances weight with static thrust
    pub fn hover_throttle(&self) -> f64 {
        self.hover_throttle
    }

    pub fn max_collective(&self) -> f64 {
        self.max_collective
    }

    pub fn max_thrust_per_rotor(&self) -> f64 {
        self.max_thrust_per_rotor
    }
}

/// Map the 0-255 power scale linearly onto [0, max rpm]
pub fn power_to_rpm(power: u8, max_rpm: f64) -> f64 {
    f64::from(power) / f64::from(u8::MAX) * max_rpm
}
