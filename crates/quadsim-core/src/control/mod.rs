//! Attitude control
//!
//! - PID per axis on wrapped angle errors
//! - X-frame mixer from torque demand and collective to rotor thrusts

pub mod pid;
pub mod mixer;

pub use pid::*;
pub use mixer::*;
