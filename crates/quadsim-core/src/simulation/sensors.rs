//! Sensor models for simulation
//!
//! Provides noisy IMU, magnetometer, barometric altitude and downward
//! time-of-flight readings from the true vehicle state. Biases are drawn once
//! per model instance; white noise is drawn on every sample.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::dynamics::QuadrotorState;
use crate::gravity_enu;
use crate::math::rotation_pair;

/// Minimum cosine between body-down and world-down for a valid range reading
const TOF_MIN_DOWN_COS: f64 = 1e-3;
/// Range readings saturate at this multiple of the field height
const TOF_RANGE_FACTOR: f64 = 1.2;

/// Noise and bias standard deviations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Gyroscope bias std dev [rad/s]
    pub gyro_bias_std: f64,
    /// Accelerometer bias std dev [m/s²]
    pub accel_bias_std: f64,
    /// Gyroscope noise std dev [rad/s]
    pub gyro_noise_std: f64,
    /// Accelerometer noise std dev [m/s²]
    pub accel_noise_std: f64,
    pub mag_bias_std: f64,
    pub mag_noise_std: f64,
    /// Altimeter noise std dev [m]
    pub altitude_noise_std: f64,
    /// Range sensor noise std dev [m]
    pub tof_noise_std: f64,
    /// Earth magnetic field (world frame)
    pub earth_magnetic_field: Vector3<f64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            gyro_bias_std: 0.001,
            accel_bias_std: 0.02,
            gyro_noise_std: 0.01,
            accel_noise_std: 0.1,
            mag_bias_std: 0.02,
            mag_noise_std: 0.005,
            altitude_noise_std: 0.05,
            tof_noise_std: 0.02,
            earth_magnetic_field: Vector3::new(0.21, 0.0, 0.43),
        }
    }
}

impl SensorConfig {
    /// Noise-free sensors
    pub fn ideal() -> Self {
        Self {
            gyro_bias_std: 0.0,
            accel_bias_std: 0.0,
            gyro_noise_std: 0.0,
            accel_noise_std: 0.0,
            mag_bias_std: 0.0,
            mag_noise_std: 0.0,
            altitude_noise_std: 0.0,
            tof_noise_std: 0.0,
            ..Default::default()
        }
    }
}

/// One sample of every sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Angular rate [rad/s] (body frame)
    pub gyro: Vector3<f64>,
    /// Specific force [m/s²] (body frame)
    pub accel: Vector3<f64>,
    /// Magnetic field (body frame)
    pub mag: Vector3<f64>,
    /// True altitude clamped to [0, field height] [m]
    pub abs_altitude: f64,
    /// Noisy altitude, never negative [m]
    pub altitude: f64,
    /// Slant range to the ground along body-down [m]; `None` when the body
    /// axis does not point at the ground
    pub tof: Option<f64>,
}

/// Sensor suite with fixed per-instance biases
#[derive(Debug, Clone)]
pub struct SensorModel {
    config: SensorConfig,
    field_height: f64,
    gyro_bias: Vector3<f64>,
    accel_bias: Vector3<f64>,
    mag_bias: Vector3<f64>,
    rng: StdRng,
}

impl SensorModel {
    /// Draw biases from `rng` and seed the per-sample noise stream from it
    pub fn new(config: &SensorConfig, field_height: f64, rng: &mut impl RngCore) -> Self {
        let gyro_bias = gaussian_vec3(rng, config.gyro_bias_std);
        let accel_bias = gaussian_vec3(rng, config.accel_bias_std);
        let mag_bias = gaussian_vec3(rng, config.mag_bias_std);

        Self {
            config: *config,
            field_height,
            gyro_bias,
            accel_bias,
            mag_bias,
            rng: StdRng::seed_from_u64(rng.next_u64()),
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn gyro_bias(&self) -> Vector3<f64> {
        self.gyro_bias
    }

    pub fn accel_bias(&self) -> Vector3<f64> {
        self.accel_bias
    }

    /// Sample all sensors
    ///
    /// The accelerometer measures Rᵀ(a + g·ẑ), using the acceleration stored
    /// in the state by the previous physics step.
    pub fn measure(&mut self, state: &QuadrotorState, gravity: f64) -> SensorReading {
        let cfg = self.config;
        let rng = &mut self.rng;

        let gyro = state.angular_velocity + self.gyro_bias + gaussian_vec3(rng, cfg.gyro_noise_std);

        let (rot, rot_t) = rotation_pair(&state.orientation);
        let specific_force = state.world_acceleration - gravity_enu(gravity);
        let accel = rot_t * specific_force + self.accel_bias + gaussian_vec3(rng, cfg.accel_noise_std);

        let mag = rot_t * cfg.earth_magnetic_field
            + self.mag_bias
            + gaussian_vec3(rng, cfg.mag_noise_std);

        let abs_altitude = state.position.z.min(self.field_height).max(0.0);
        let altitude = (abs_altitude + gaussian(rng, cfg.altitude_noise_std)).max(0.0);

        let body_down = rot * Vector3::new(0.0, 0.0, -1.0);
        let down_cos = (-body_down.z).max(0.0);
        let tof = (down_cos > TOF_MIN_DOWN_COS).then(|| {
            let range = (abs_altitude / down_cos + gaussian(rng, cfg.tof_noise_std)).max(0.0);
            range.min(self.field_height * TOF_RANGE_FACTOR)
        });

        SensorReading {
            gyro,
            accel,
            mag,
            abs_altitude,
            altitude,
            tof,
        }
    }
}

fn gaussian(rng: &mut impl RngCore, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 0.0;
    }
    let z: f64 = rng.sample(StandardNormal);
    z * std_dev
}

fn gaussian_vec3(rng: &mut impl RngCore, std_dev: f64) -> Vector3<f64> {
    Vector3::new(
        gaussian(rng, std_dev),
        gaussian(rng, std_dev),
        gaussian(rng, std_dev),
    )
}
