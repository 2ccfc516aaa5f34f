//! Surface exposed to user automation scripts
//!
//! Scripts read the most recently published sensor data and may take over
//! individual rotors on the 0-255 power scale. A faulting script is disabled
//! by clearing every override so the attitude controller flies again.

use nalgebra::Vector3;
use thiserror::Error;
use tracing::warn;

use quadsim_core::math::EulerAngles;
use quadsim_core::simulation::Timeline;
use quadsim_core::ROTOR_COUNT;

use crate::runner::{RuntimeError, SimulationHandle};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("no rotor with index {0}")]
    UnknownRotor(usize),

    #[error("rotor power must be finite, got {0}")]
    InvalidPower(f64),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Raw inertial measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imu {
    /// [rad/s]
    pub gyro: Vector3<f64>,
    /// [m/s²]
    pub accel: Vector3<f64>,
}

pub struct ConsoleApi<'a> {
    handle: &'a SimulationHandle,
}

impl<'a> ConsoleApi<'a> {
    pub fn new(handle: &'a SimulationHandle) -> Self {
        Self { handle }
    }

    /// True altitude clamped to the field [m]
    pub fn abs_altitude(&self) -> Option<f64> {
        self.handle.latest().map(|f| f.snapshot.sensors.abs_altitude)
    }

    /// Noisy altimeter reading [m]
    pub fn altitude(&self) -> Option<f64> {
        self.handle.latest().map(|f| f.snapshot.sensors.altitude)
    }

    /// Filter output [rad]
    pub fn estimated_attitude(&self) -> Option<EulerAngles> {
        self.handle.latest().map(|f| f.snapshot.estimate.euler())
    }

    /// Ground-truth attitude [rad]
    pub fn attitude(&self) -> Option<EulerAngles> {
        self.handle.latest().map(|f| f.snapshot.state.euler)
    }

    pub fn imu(&self) -> Option<Imu> {
        self.handle.latest().map(|f| Imu {
            gyro: f.snapshot.sensors.gyro,
            accel: f.snapshot.sensors.accel,
        })
    }

    pub fn magnetometer(&self) -> Option<Vector3<f64>> {
        self.handle.latest().map(|f| f.snapshot.sensors.mag)
    }

    /// Downward range [m]; `None` also when the sensor has no ground in view
    pub fn tof(&self) -> Option<f64> {
        self.handle.latest().and_then(|f| f.snapshot.sensors.tof)
    }

    pub fn timeline(&self) -> Option<Timeline> {
        self.handle.latest().map(|f| f.snapshot.timeline)
    }

    /// Drive rotor `rotor` at `power` on the 0-255 scale
    ///
    /// Values outside the scale are saturated and rounded.
    pub fn set_rotor_power(&self, rotor: usize, power: f64) -> Result<(), ConsoleError> {
        if rotor >= ROTOR_COUNT {
            return Err(ConsoleError::UnknownRotor(rotor));
        }
        if !power.is_finite() {
            return Err(ConsoleError::InvalidPower(power));
        }
        let power = power.round().clamp(0.0, u8::MAX as f64) as u8;
        self.handle.set_rotor_power(rotor, Some(power))?;
        Ok(())
    }

    /// Hand rotor `rotor` back to the controller
    pub fn clear_rotor(&self, rotor: usize) -> Result<(), ConsoleError> {
        if rotor >= ROTOR_COUNT {
            return Err(ConsoleError::UnknownRotor(rotor));
        }
        self.handle.set_rotor_power(rotor, None)?;
        Ok(())
    }

    pub fn clear_all_rotors(&self) -> Result<(), ConsoleError> {
        self.handle.set_rotor_overrides(Vec::new(), true)?;
        Ok(())
    }

    /// Stop a faulting script: log the reason and release every rotor
    pub fn disable(&self, reason: &str) -> Result<(), ConsoleError> {
        warn!(reason, "console automation disabled, clearing rotor overrides");
        self.clear_all_rotors()
    }
}
