//! Simulation configuration
//!
//! Defines configuration structures for setting up simulations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::AttitudeGains;
use crate::dynamics::PhysicsConfig;
use crate::error::ConfigError;
use super::sensors::SensorConfig;

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation time step [s]
    pub dt: f64,
    /// Length of one flight session before the vehicle is reset [s]
    pub session_duration: f64,
    /// Accelerometer weight of the complementary filter
    pub filter_alpha: f64,
    /// Attitude PID gains
    pub pid: AttitudeGains,
    /// Sensor noise configuration
    pub sensors: SensorConfig,
    /// Aerodynamic damping
    pub physics: PhysicsConfig,
    /// RNG seed; `None` seeds from the operating system
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 0.005, // 200 Hz control loop
            session_duration: 30.0,
            filter_alpha: 0.05,
            pid: AttitudeGains::default(),
            sensors: SensorConfig::default(),
            physics: PhysicsConfig::default(),
            seed: None,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON text and validate it
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if !(self.session_duration > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "session_duration must be positive, got {}",
                self.session_duration
            )));
        }
        if !(0.0..=1.0).contains(&self.filter_alpha) {
            return Err(ConfigError::Invalid(format!(
                "filter_alpha must lie in [0, 1], got {}",
                self.filter_alpha
            )));
        }
        let sigmas = [
            self.sensors.gyro_bias_std,
            self.sensors.accel_bias_std,
            self.sensors.gyro_noise_std,
            self.sensors.accel_noise_std,
            self.sensors.mag_bias_std,
            self.sensors.mag_noise_std,
            self.sensors.altitude_noise_std,
            self.sensors.tof_noise_std,
        ];
        if sigmas.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
            return Err(ConfigError::Invalid(
                "sensor standard deviations must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Config with noise-free sensors
    pub fn ideal() -> Self {
        Self {
            sensors: SensorConfig::ideal(),
            ..Default::default()
        }
    }
}
