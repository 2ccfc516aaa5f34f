//! Torque/collective to per-rotor thrust allocation
//!
//! Inverts the X-frame allocation
//!
//! τx = d·(T₁ − T₂ − T₃ + T₄)
//! τy = d·(−T₁ − T₂ + T₃ + T₄)
//! τz = K·(−T₁ + T₂ − T₃ + T₄)
//! S  = T₁ + T₂ + T₃ + T₄
//!
//! with d the arm offset and K the yaw torque factor.

use nalgebra::Vector3;

use crate::airframe::Airframe;
use crate::ROTOR_COUNT;

/// Arm offset used when the airframe reports zero [m]
const FALLBACK_ARM_OFFSET: f64 = 1e-3;
/// Smallest magnitude allowed for the yaw torque factor [m]
const MIN_YAW_FACTOR: f64 = 1e-4;

/// Thrust mixer for a 4-rotor X frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixer {
    arm_offset: f64,
    yaw_factor: f64,
}

impl Mixer {
    pub fn new(arm_offset: f64, yaw_torque_factor: f64) -> Self {
        let arm_offset = if arm_offset == 0.0 {
            FALLBACK_ARM_OFFSET
        } else {
            arm_offset
        };
        let yaw_factor = if yaw_torque_factor.abs() < MIN_YAW_FACTOR {
            MIN_YAW_FACTOR
        } else {
            yaw_torque_factor
        };
        Self {
            arm_offset,
            yaw_factor,
        }
    }

    pub fn from_airframe(airframe: &Airframe) -> Self {
        Self::new(airframe.arm_offset, airframe.yaw_torque_factor)
    }

    /// Per-rotor thrust [N] for a body torque demand and collective thrust
    ///
    /// Each thrust is clamped to be non-negative; no upper clamp is applied.
    pub fn mix(&self, torque: &Vector3<f64>, collective: f64) -> [f64; ROTOR_COUNT] {
        let x = torque.x / self.arm_offset;
        let y = torque.y / self.arm_offset;
        let z = torque.z / self.yaw_factor;
        let s = collective;

        [
            (s + x - y - z) / 4.0,
            (s - x - y + z) / 4.0,
            (s - x + y - z) / 4.0,
            (s + x + y + z) / 4.0,
        ]
        .map(|t| t.max(0.0))
    }
}
