//! Simulation framework
//!
//! Ties physics, sensors, estimation and control into a fixed-step loop with
//! periodic session resets, and exposes observer snapshots.

pub mod config;
pub mod sensors;
pub mod simulator;
pub mod snapshot;

pub use config::*;
pub use sensors::*;
pub use simulator::*;
pub use snapshot::*;
