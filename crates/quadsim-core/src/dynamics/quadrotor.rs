//! Quadrotor rigid-body dynamics
//!
//! Rotor-driven 6-DoF model integrated with explicit Euler:
//!
//! ṗ = v
//! m·v̇ = R(q)·Σ Tᵢe₃ − c_v·v − m·g·e₃
//! q̇ = 1/2 Λ(q)[0; ω]
//! J·ω̇ = τ − ω × Jω − c_ω·ω
//!
//! where:
//! - p, v: position and velocity (world frame, z up)
//! - q: orientation (body to world)
//! - ω: angular velocity (body frame)
//! - Tᵢ: thrust of rotor i after first-order motor lag
//! - τ: lever-arm torque plus rotor reaction torque

use std::sync::Arc;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::propulsion::Propulsion;
use crate::airframe::{Airframe, SPIN_DIRECTIONS};
use crate::math::{integrate_quaternion, rotation_pair};
use crate::{gravity_enu, ROTOR_COUNT};

/// Horizontal velocity retained per step while touching the ground
const GROUND_FRICTION: f64 = 0.65;
/// Angular velocity retained per step while parked
const GROUND_SPIN_DAMPING: f64 = 0.6;
/// Height below which the vehicle counts as touching the ground [m]
const GROUND_EPSILON: f64 = 1e-4;
/// Fraction of weight the rotors must exceed to leave the ground
const LIFTOFF_THRUST_RATIO: f64 = 0.9;

/// Per-rotor motor state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotorState {
    /// Last commanded speed after clamping [rpm]
    pub command_rpm: f64,
    /// Lagged actual speed [rpm]
    pub rpm: f64,
    /// Thrust [N]
    pub thrust: f64,
    /// Reaction torque magnitude [N·m]
    pub torque: f64,
}

/// Quadrotor state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrotorState {
    /// Position [m] (world frame)
    pub position: Vector3<f64>,
    /// Velocity [m/s] (world frame)
    pub velocity: Vector3<f64>,
    /// Orientation (body to world)
    pub orientation: UnitQuaternion<f64>,
    /// Angular velocity [rad/s] (body frame)
    pub angular_velocity: Vector3<f64>,
    pub rotors: [RotorState; ROTOR_COUNT],
    /// Acceleration of the last step [m/s²] (world frame)
    pub world_acceleration: Vector3<f64>,
    pub on_ground: bool,
}

impl Default for QuadrotorState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            angular_velocity: Vector3::zeros(),
            rotors: [RotorState::default(); ROTOR_COUNT],
            world_acceleration: Vector3::zeros(),
            on_ground: true,
        }
    }
}

impl QuadrotorState {
    /// Thrust direction in world frame (body z-axis rotated to world)
    pub fn thrust_direction(&self) -> Vector3<f64> {
        self.orientation * Vector3::new(0.0, 0.0, 1.0)
    }

    /// Current rotor speeds [rpm]
    pub fn rotor_rpm(&self) -> [f64; ROTOR_COUNT] {
        self.rotors.map(|r| r.rpm)
    }
}

/// Aerodynamic damping coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Linear drag [N·s/m]
    pub linear_damping: f64,
    /// Rotational drag [N·m·s/rad]
    pub angular_damping: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            linear_damping: 0.4,
            angular_damping: 0.015,
        }
    }
}

/// Forces and torques computed during one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepForces {
    /// Sum of rotor thrusts [N]
    pub total_thrust: f64,
    /// Thrust vector [N] (body frame)
    pub thrust_body: Vector3<f64>,
    /// Torque [N·m] (body frame)
    pub torque_body: Vector3<f64>,
    /// Thrust vector [N] (world frame)
    pub thrust_world: Vector3<f64>,
    /// Acceleration [m/s²] (world frame)
    pub acceleration_world: Vector3<f64>,
}

/// Quadrotor dynamics model
#[derive(Debug, Clone)]
pub struct QuadrotorDynamics {
    airframe: Arc<Airframe>,
    pub config: PhysicsConfig,
}

impl QuadrotorDynamics {
    pub fn new(airframe: Arc<Airframe>, config: PhysicsConfig) -> Self {
        Self { airframe, config }
    }

    pub fn airframe(&self) -> &Airframe {
        &self.airframe
    }

    /// Advance the state by `dt` given per-rotor speed commands [rpm]
    ///
    /// Commands are clamped to [0, max rpm]; non-finite commands stop the
    /// rotor.
    pub fn step(
        &self,
        state: &mut QuadrotorState,
        commands_rpm: &[f64; ROTOR_COUNT],
        dt: f64,
    ) -> StepForces {
        let frame = &*self.airframe;
        let propulsion = Propulsion::new(frame);

        let (rot, rot_t) = rotation_pair(&state.orientation);
        let body_velocity = rot_t * state.velocity;
        let axial_velocity = -body_velocity.z;

        let alpha = dt / (frame.motor_time_constant + dt);

        let mut total_thrust = 0.0;
        let mut thrust_body = Vector3::zeros();
        let mut torque_body = Vector3::zeros();

        for (i, rotor) in state.rotors.iter_mut().enumerate() {
            let target = if commands_rpm[i].is_finite() {
                commands_rpm[i].clamp(0.0, frame.max_rpm)
            } else {
                0.0
            };
            rotor.command_rpm = target;
            rotor.rpm += (target - rotor.rpm) * alpha;

            let load = propulsion.thrust_and_torque(rotor.rpm, axial_velocity);
            rotor.thrust = load.thrust;
            rotor.torque = load.torque;
            total_thrust += load.thrust;

            let force = Vector3::new(0.0, 0.0, load.thrust);
            thrust_body += force;
            torque_body += frame.rotor_positions[i].cross(&force);
            torque_body.z += SPIN_DIRECTIONS[i] * load.torque;
        }

        // Translational dynamics
        let thrust_world = rot * thrust_body;
        let force_world = thrust_world - self.config.linear_damping * state.velocity
            + frame.mass * gravity_enu(frame.gravity);
        let acceleration = force_world / frame.mass;

        state.velocity += acceleration * dt;
        state.position += state.velocity * dt;

        let mut felt_acceleration = acceleration;
        if state.position.z < 0.0 {
            state.position.z = 0.0;
            if state.velocity.z < 0.0 {
                state.velocity.z = 0.0;
            }
            state.velocity.x *= GROUND_FRICTION;
            state.velocity.y *= GROUND_FRICTION;
            // normal force cancels any downward acceleration
            felt_acceleration.z = felt_acceleration.z.max(0.0);
        }
        state.world_acceleration = felt_acceleration;

        // Rotational dynamics
        let inertia = &frame.inertia;
        let omega = state.angular_velocity;
        let gyroscopic = omega.cross(&inertia.component_mul(&omega));
        let angular_acceleration = (torque_body - gyroscopic
            - self.config.angular_damping * omega)
            .component_div(inertia);

        state.angular_velocity += angular_acceleration * dt;
        state.orientation = integrate_quaternion(&state.orientation, &state.angular_velocity, dt);

        state.on_ground = state.position.z <= GROUND_EPSILON
            && total_thrust < frame.weight() * LIFTOFF_THRUST_RATIO;
        if state.on_ground {
            state.angular_velocity *= GROUND_SPIN_DAMPING;
        }

        StepForces {
            total_thrust,
            thrust_body,
            torque_body,
            thrust_world,
            acceleration_world: felt_acceleration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dynamics() -> QuadrotorDynamics {
        QuadrotorDynamics::new(Arc::new(Airframe::default()), PhysicsConfig::default())
    }

    /// Rotor speed that holds the vehicle in steady hover
    fn hover_rpm(dynamics: &QuadrotorDynamics) -> f64 {
        let frame = dynamics.airframe();
        Propulsion::new(frame).rpm_from_thrust(frame.weight() / ROTOR_COUNT as f64)
    }

    #[test]
    fn test_default_state() {
        let state = QuadrotorState::default();

        assert_eq!(state.position, Vector3::zeros());
        assert_eq!(state.orientation, UnitQuaternion::identity());
        assert_relative_eq!(state.thrust_direction(), Vector3::z(), epsilon = 1e-12);
        assert_eq!(state.rotor_rpm(), [0.0; ROTOR_COUNT]);
    }

    #[test]
    fn test_parked_vehicle_stays_on_ground() {
        let dyn_ = dynamics();
        let mut state = QuadrotorState::default();

        for _ in 0..100 {
            dyn_.step(&mut state, &[0.0; ROTOR_COUNT], 0.005);
        }

        assert_eq!(state.position.z, 0.0);
        assert_eq!(state.velocity, Vector3::zeros());
        assert!(state.on_ground);
        // ground reaction: no downward acceleration reported
        assert_relative_eq!(state.world_acceleration.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_motor_lag_first_order() {
        let dyn_ = dynamics();
        let mut state = QuadrotorState::default();
        let dt = 0.005;
        let tau = dyn_.airframe().motor_time_constant;

        dyn_.step(&mut state, &[1000.0; ROTOR_COUNT], dt);

        let expected = 1000.0 * dt / (tau + dt);
        for rotor in &state.rotors {
            assert_eq!(rotor.command_rpm, 1000.0);
            assert_relative_eq!(rotor.rpm, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_commands_are_clamped() {
        let dyn_ = dynamics();
        let max = dyn_.airframe().max_rpm;
        let mut state = QuadrotorState::default();

        dyn_.step(&mut state, &[-50.0, 1.0e6, f64::NAN, 100.0], 0.005);

        assert_eq!(state.rotors[0].command_rpm, 0.0);
        assert_eq!(state.rotors[1].command_rpm, max);
        assert_eq!(state.rotors[2].command_rpm, 0.0);
        assert_eq!(state.rotors[3].command_rpm, 100.0);
    }

    #[test]
    fn test_hover_balances_gravity() {
        let dyn_ = dynamics();
        let rpm = hover_rpm(&dyn_);
        let mut state = QuadrotorState {
            position: Vector3::new(0.0, 0.0, 5.0),
            on_ground: false,
            ..Default::default()
        };
        for rotor in state.rotors.iter_mut() {
            rotor.rpm = rpm;
        }

        let forces = dyn_.step(&mut state, &[rpm; ROTOR_COUNT], 0.005);

        assert_relative_eq!(forces.total_thrust, dyn_.airframe().weight(), epsilon = 1e-9);
        assert_relative_eq!(forces.acceleration_world, Vector3::zeros(), epsilon = 1e-9);
        // reaction torques cancel on a symmetric frame
        assert_relative_eq!(forces.torque_body, Vector3::zeros(), epsilon = 1e-9);
        assert!(!state.on_ground);
    }

    #[test]
    fn test_full_throttle_climbs() {
        let dyn_ = dynamics();
        let max = dyn_.airframe().max_rpm;
        let mut state = QuadrotorState::default();

        for _ in 0..200 {
            dyn_.step(&mut state, &[max; ROTOR_COUNT], 0.005);
        }

        assert!(state.position.z > 1.0);
        assert!(!state.on_ground);
    }

    #[test]
    fn test_differential_thrust_produces_roll_torque() {
        let dyn_ = dynamics();
        let rpm = hover_rpm(&dyn_);
        let mut state = QuadrotorState::default();
        for rotor in state.rotors.iter_mut() {
            rotor.rpm = rpm;
        }

        // left rotors (positive y) faster
        let forces = dyn_.step(&mut state, &[rpm, 0.8 * rpm, 0.8 * rpm, rpm], 0.005);

        assert!(forces.torque_body.x > 0.0);
        assert_relative_eq!(forces.torque_body.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_spin_direction_yaw_torque() {
        let dyn_ = dynamics();
        let rpm = hover_rpm(&dyn_);
        let mut state = QuadrotorState::default();
        for rotor in state.rotors.iter_mut() {
            rotor.rpm = rpm;
        }

        // counter-clockwise rotors (1, 3) faster: positive yaw reaction
        let forces = dyn_.step(&mut state, &[0.9 * rpm, rpm, 0.9 * rpm, rpm], 0.005);

        assert!(forces.torque_body.z > 0.0);
        assert_relative_eq!(forces.torque_body.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(forces.torque_body.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_stays_normalized() {
        let dyn_ = dynamics();
        let max = dyn_.airframe().max_rpm;
        let mut state = QuadrotorState::default();

        for _ in 0..500 {
            dyn_.step(&mut state, &[max, 0.5 * max, max, 0.2 * max], 0.005);
        }

        assert_relative_eq!(state.orientation.quaternion().norm(), 1.0, epsilon = 1e-9);
        assert!(state.position.iter().all(|v| v.is_finite()));
    }
}
