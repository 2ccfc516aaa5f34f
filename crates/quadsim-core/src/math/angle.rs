//! Scalar angle helpers

use std::f64::consts::{PI, TAU};

/// Norm threshold below which a quaternion is treated as degenerate
pub const EPS: f64 = 1e-9;

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * (PI / 180.0)
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad * (180.0 / PI)
}

/// Wrap an angle into (-π, π]
///
/// Angles already inside the interval are returned unchanged, which makes
/// the operation idempotent. Non-finite input is passed through.
pub fn wrap_pi(angle: f64) -> f64 {
    if !angle.is_finite() || (angle > -PI && angle <= PI) {
        return angle;
    }

    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    if a <= -PI {
        a += TAU;
    }
    a
}
