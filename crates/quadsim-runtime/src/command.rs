//! Commands accepted by the simulation thread

use serde::{Deserialize, Serialize};

use quadsim_core::control::{Axis, PidGainsUpdate};
use quadsim_core::simulation::SetpointUpdate;

/// Inbound request to the simulation loop
///
/// Commands are applied in arrival order, before the next physics step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Change attitude [rad] and/or throttle
    SetSetpoint(SetpointUpdate),
    /// Change the gains of one axis
    UpdatePid { axis: Axis, gains: PidGainsUpdate },
    /// Set (`Some`) or clear (`None`) rotor speed overrides [rpm]
    SetRotorOverrides {
        overrides: Vec<(usize, Option<f64>)>,
        replace_all: bool,
    },
    /// Override one rotor on the 0-255 power scale, `None` clears it
    SetRotorPower { rotor: usize, power: Option<u8> },
    /// Put the vehicle back on the ground at rest
    Reset,
    Pause,
    Resume,
    /// Publish a snapshot immediately
    RequestSnapshot,
    /// Stop the loop and exit the thread
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetSetpoint(_) => "set_setpoint",
            Command::UpdatePid { .. } => "update_pid",
            Command::SetRotorOverrides { .. } => "set_rotor_overrides",
            Command::SetRotorPower { .. } => "set_rotor_power",
            Command::Reset => "reset",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::RequestSnapshot => "request_snapshot",
            Command::Shutdown => "shutdown",
        }
    }
}
