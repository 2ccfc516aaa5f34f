//! # quadsim Runtime
//!
//! Runs a [`quadsim_core::simulation::Simulator`] on a dedicated thread.
//!
//! ## Modules
//!
//! - [`command`]: Messages accepted by the simulation thread
//! - [`runner`]: Thread spawning, pacing and frame publication
//! - [`snapshot_slot`]: Published frames and the latest-frame slot
//! - [`console`]: Read/write surface for automation scripts

pub mod command;
pub mod console;
pub mod runner;
pub mod snapshot_slot;

pub use command::Command;
pub use console::{ConsoleApi, ConsoleError, Imu};
pub use runner::{
    publish_every_for, RunnerConfig, RuntimeError, SimulationHandle, SimulationRunner,
    DEFAULT_PUBLISH_RATE,
};
pub use snapshot_slot::{Frame, SnapshotSlot};
