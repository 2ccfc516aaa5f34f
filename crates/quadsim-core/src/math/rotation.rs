//! SO(3) rotation utilities
//!
//! Rotation matrix helpers used by the physics step and the sensor model.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Rotation matrix from quaternion
///
/// R(q) maps body-frame vectors into the world frame:
/// ```text
/// [1-2(y²+z²)   2(xy-wz)    2(xz+wy)]
/// [2(xy+wz)    1-2(x²+z²)   2(yz-wx)]
/// [2(xz-wy)     2(yz+wx)   1-2(x²+y²)]
/// ```
pub fn rotation_matrix(q: &UnitQuaternion<f64>) -> Matrix3<f64> {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);

    Matrix3::new(
        1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy),
        2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx),
        2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy),
    )
}

/// Rotation matrix and its transpose (world-to-body)
pub fn rotation_pair(q: &UnitQuaternion<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let rot = rotation_matrix(q);
    let rot_t = rot.transpose();
    (rot, rot_t)
}

/// Rotate a vector by a rotation matrix
///
/// v' = M * v
pub fn rotate(m: &Matrix3<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    m * v
}

/// Body z-axis in world frame (thrust direction for quadrotor)
///
/// z_body = R(q) * [0, 0, 1]^T
pub fn body_z_axis(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    rotate(&rotation_matrix(q), &Vector3::new(0.0, 0.0, 1.0))
}
