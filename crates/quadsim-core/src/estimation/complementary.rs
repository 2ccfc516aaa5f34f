//! Complementary attitude filter
//!
//! Gyro integration corrected toward the gravity direction seen by the
//! accelerometer:
//!
//! roll  = (1−α)·roll_gyro  + α·atan2(a_y, a_z)
//! pitch = (1−α)·pitch_gyro + α·atan2(−a_x, √(a_y² + a_z²))
//! yaw   = yaw_gyro
//!
//! The blend is done on Euler angles, so it is only accurate near level
//! flight. Yaw has no absolute reference and drifts with gyro bias.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::{euler_from_quaternion, integrate_quaternion, quaternion_from_euler, wrap_pi, EulerAngles};
use crate::simulation::SensorReading;

/// Accelerometer magnitude below which no correction is applied [m/s²]
const MIN_ACCEL_NORM: f64 = 1e-4;

/// Estimated attitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttitudeEstimate {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub quaternion: UnitQuaternion<f64>,
}

impl AttitudeEstimate {
    pub fn euler(&self) -> EulerAngles {
        EulerAngles::new(self.roll, self.pitch, self.yaw)
    }
}

impl Default for AttitudeEstimate {
    fn default() -> Self {
        Self {
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            quaternion: UnitQuaternion::identity(),
        }
    }
}

/// One filter update from a prior orientation
///
/// Returns the new estimate; its quaternion is the prior for the next call.
pub fn complementary_step(
    alpha: f64,
    prior: &UnitQuaternion<f64>,
    gyro: &Vector3<f64>,
    accel: &Vector3<f64>,
    dt: f64,
) -> AttitudeEstimate {
    let predicted = integrate_quaternion(prior, gyro, dt);
    let EulerAngles { mut roll, mut pitch, yaw } = euler_from_quaternion(&predicted);

    let norm = accel.norm();
    if norm > MIN_ACCEL_NORM {
        let a = accel / norm;
        let roll_acc = a.y.atan2(a.z);
        let pitch_acc = (-a.x).atan2(a.y.hypot(a.z));

        roll = wrap_pi((1.0 - alpha) * roll + alpha * roll_acc);
        pitch = wrap_pi((1.0 - alpha) * pitch + alpha * pitch_acc);
    }

    AttitudeEstimate {
        roll,
        pitch,
        yaw,
        quaternion: quaternion_from_euler(roll, pitch, yaw),
    }
}

/// Complementary filter with its running orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplementaryFilter {
    /// Accelerometer weight per update, in [0, 1]
    pub alpha: f64,
    quaternion: UnitQuaternion<f64>,
}

impl ComplementaryFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            quaternion: UnitQuaternion::identity(),
        }
    }

    pub fn reset(&mut self, orientation: UnitQuaternion<f64>) {
        self.quaternion = orientation;
    }

    pub fn orientation(&self) -> &UnitQuaternion<f64> {
        &self.quaternion
    }

    pub fn update(&mut self, reading: &SensorReading, dt: f64) -> AttitudeEstimate {
        let estimate = complementary_step(self.alpha, &self.quaternion, &reading.gyro, &reading.accel, dt);
        self.quaternion = estimate.quaternion;
        estimate
    }
}

impl Default for ComplementaryFilter {
    fn default() -> Self {
        Self::new(0.05)
    }
}
