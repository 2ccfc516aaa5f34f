//! Quaternion operations for attitude representation
//!
//! Quaternions are stored scalar-first (w, x, y, z) and describe the
//! world-from-body rotation:
//! - Quaternion derivative: q̇ = 1/2 q ⊗ [0; ω]
//! - Explicit Euler integration followed by renormalisation
//! - Conversion to and from roll/pitch/yaw (ZYX order)

use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use super::angle::EPS;

/// Build a quaternion from scalar-first components
pub fn quat(w: f64, x: f64, y: f64, z: f64) -> Quaternion<f64> {
    Quaternion::new(w, x, y, z)
}

/// Normalize a quaternion, collapsing to identity when the norm vanishes
///
/// A norm below 1e-9 yields the identity rotation instead of NaN components.
pub fn normalize_or_identity(q: &Quaternion<f64>) -> UnitQuaternion<f64> {
    let norm = q.norm();
    if !(norm >= EPS) {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::new_unchecked(*q / norm)
}

/// Compute the quaternion derivative given angular velocity
///
/// q̇ = 1/2 Λ(q)[0;ω]
///
/// # Arguments
/// * `q` - Current orientation as unit quaternion
/// * `omega` - Angular velocity in body frame [rad/s]
///
/// # Returns
/// Quaternion derivative as Vector4 (w, x, y, z)
pub fn quaternion_derivative(q: &UnitQuaternion<f64>, omega: &Vector3<f64>) -> Vector4<f64> {
    // Λ(q) = [w  -x  -y  -z]
    //        [x   w  -z   y]
    //        [y   z   w  -x]
    //        [z  -y   x   w]
    let w = q.w;
    let x = q.i;
    let y = q.j;
    let z = q.k;

    let omega_quat = Vector4::new(0.0, omega.x, omega.y, omega.z);

    let lambda = Matrix4::new(
        w, -x, -y, -z,
        x,  w, -z,  y,
        y,  z,  w, -x,
        z, -y,  x,  w,
    );

    0.5 * lambda * omega_quat
}

/// Integrate orientation over one step of body angular velocity
///
/// q_new = normalize(q + q̇ * dt)
pub fn integrate_quaternion(
    q: &UnitQuaternion<f64>,
    omega: &Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    let q_dot = quaternion_derivative(q, omega);
    let q_new = Vector4::new(q.w, q.i, q.j, q.k) + q_dot * dt;

    normalize_or_identity(&quat(q_new[0], q_new[1], q_new[2], q_new[3]))
}

/// Roll, pitch and yaw angles [rad]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Same angles expressed in degrees
    pub fn to_degrees(&self) -> Self {
        Self {
            roll: self.roll.to_degrees(),
            pitch: self.pitch.to_degrees(),
            yaw: self.yaw.to_degrees(),
        }
    }
}

/// Extract roll/pitch/yaw from a unit quaternion
///
/// Pitch is clamped to ±π/2 at gimbal lock instead of taking asin of a value
/// outside [-1, 1].
pub fn euler_from_quaternion(q: &UnitQuaternion<f64>) -> EulerAngles {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    let sinr = 2.0 * (w * x + y * z);
    let cosr = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr.atan2(cosr);

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        std::f64::consts::FRAC_PI_2.copysign(sinp)
    } else {
        sinp.asin()
    };

    let siny = 2.0 * (w * z + x * y);
    let cosy = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny.atan2(cosy);

    EulerAngles { roll, pitch, yaw }
}

/// Build a unit quaternion from roll/pitch/yaw using half-angle products
pub fn quaternion_from_euler(roll: f64, pitch: f64, yaw: f64) -> UnitQuaternion<f64> {
    let (sr, cr) = (roll * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sy, cy) = (yaw * 0.5).sin_cos();

    normalize_or_identity(&quat(
        cy * cp * cr + sy * sp * sr,
        cy * cp * sr - sy * sp * cr,
        cy * sp * cr + sy * cp * sr,
        sy * cp * cr - cy * sp * sr,
    ))
}
