//! Mathematical utilities for quadsim
//!
//! Implements quaternion kinematics, Euler conversions, rotation matrix
//! helpers and angle wrapping.

pub mod quaternion;
pub mod rotation;
pub mod angle;

pub use quaternion::*;
pub use rotation::*;
pub use angle::*;
