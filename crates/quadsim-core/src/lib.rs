//! # quadsim Core
//!
//! Quadrotor flight simulation core library
//!
//! This library implements the closed-loop pipeline of a small X-frame
//! quadrotor simulator: rigid-body physics with propeller-table aerodynamics
//! and motor lag, a noisy sensor suite, a complementary attitude filter and a
//! PID attitude controller feeding a four-rotor mixer, all stepped at a fixed
//! timestep and grouped into fixed-length sessions.
//!
//! ## Modules
//!
//! - [`math`]: Quaternion, rotation and angle utilities
//! - [`airframe`]: Airframe specification document and derived parameters
//! - [`dynamics`]: Propulsion model and rigid-body physics
//! - [`control`]: PID controllers and the rotor mixer
//! - [`estimation`]: Complementary attitude filter
//! - [`simulation`]: Sensor model, session timeline, orchestrator and snapshots

pub mod math;
pub mod airframe;
pub mod dynamics;
pub mod control;
pub mod estimation;
pub mod simulation;

mod error;

pub use error::ConfigError;

// Common type aliases
use nalgebra::{Vector3, Matrix3, UnitQuaternion};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

/// Unit quaternion type for rotations (world-from-body)
pub type Quat = UnitQuaternion<f64>;

/// Number of rotors on the simulated airframe
pub const ROTOR_COUNT: usize = 4;

/// Standard gravity [m/s²], used by the built-in airframe dataset
pub const GRAVITY: f64 = 9.81;

/// Gravity vector for the z-up world frame
pub fn gravity_enu(gravity: f64) -> Vec3 {
    Vec3::new(0.0, 0.0, -gravity)
}
