//! Observer-facing copy of the simulator state

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::sensors::SensorReading;
use super::simulator::{Setpoint, Timeline};
use crate::control::AttitudeGains;
use crate::estimation::AttitudeEstimate;
use crate::math::EulerAngles;
use crate::ROTOR_COUNT;

/// Complete, self-contained view of one simulator instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub dt: f64,
    pub mass: f64,
    pub gravity: f64,
    pub hover_throttle: f64,
    pub setpoint: Setpoint,
    pub timeline: Timeline,
    pub pid: AttitudeGains,
    /// True vehicle state
    pub state: VehicleSnapshot,
    /// Filter output of the last step
    pub estimate: AttitudeEstimate,
    /// Sensor sample of the last step
    pub sensors: SensorReading,
    pub rotors: [RotorSnapshot; ROTOR_COUNT],
    pub airframe: AirframeSummary,
    /// The most recent step ended a session
    pub session_reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub quaternion: UnitQuaternion<f64>,
    /// Attitude [rad]
    pub euler: EulerAngles,
    /// Attitude [deg]
    pub euler_deg: EulerAngles,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotorSnapshot {
    pub command_rpm: f64,
    pub rpm: f64,
    pub thrust: f64,
    pub override_rpm: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirframeSummary {
    pub mass: f64,
    pub inertia: Vector3<f64>,
    pub wheelbase: f64,
    pub yaw_torque_factor: f64,
    pub hover_rpm: f64,
    pub max_rpm: f64,
    pub max_collective: f64,
}

impl Snapshot {
    /// Serialize as a single JSON line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
