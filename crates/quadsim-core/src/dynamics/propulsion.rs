//! Propeller thrust and torque model
//!
//! Coefficient-based model: T = Ct·ρ·n²·D⁴ and Q = Cq·ρ·n²·D⁵, with n in
//! revolutions per second and Ct, Cq looked up against the advance ratio
//! J = V / (n·D).

use crate::airframe::{Airframe, PropellerParams};
use crate::ROTOR_COUNT;

/// Rotor speed below which the propeller is treated as stopped [rev/s]
const STOPPED_REV_PER_S: f64 = 1e-3;

/// Coefficients at one operating point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coefficients {
    pub ct: f64,
    pub cq: f64,
    /// Advance ratio after clamping to the table range
    pub j: f64,
}

/// Thrust [N] and reaction torque [N·m] of one rotor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotorLoad {
    pub thrust: f64,
    pub torque: f64,
    pub ct: f64,
    pub cq: f64,
}

/// Propeller model over a shared airframe
#[derive(Debug, Clone, Copy)]
pub struct Propulsion<'a> {
    prop: &'a PropellerParams,
    air_density: f64,
    max_rpm: f64,
}

impl<'a> Propulsion<'a> {
    pub fn new(airframe: &'a Airframe) -> Self {
        Self {
            prop: &airframe.propeller,
            air_density: airframe.air_density,
            max_rpm: airframe.max_rpm,
        }
    }

    /// Look up Ct and Cq for a rotor speed [rev/s] and axial inflow [m/s]
    pub fn coefficients(&self, rev_per_s: f64, axial_velocity: f64) -> Coefficients {
        if !(rev_per_s >= STOPPED_REV_PER_S) {
            return Coefficients::default();
        }

        let table = &self.prop.advance_ratios;
        let (first, last) = match (table.first(), table.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Coefficients {
                    ct: self.prop.ct0,
                    cq: self.prop.cq0,
                    j: 0.0,
                }
            }
        };

        let j = (axial_velocity.abs() / (rev_per_s * self.prop.diameter)).clamp(first, last);

        Coefficients {
            ct: interpolate(table, &self.prop.ct_table, j),
            cq: interpolate(table, &self.prop.cq_table, j),
            j,
        }
    }

    /// Thrust and torque for a rotor speed [rpm] and axial inflow [m/s]
    ///
    /// Negative speeds are treated as stopped.
    pub fn thrust_and_torque(&self, rpm: f64, axial_velocity: f64) -> RotorLoad {
        let n = rpm.max(0.0) / 60.0;
        let c = self.coefficients(n, axial_velocity);
        let d = self.prop.diameter;
        let q = self.air_density * n * n;

        RotorLoad {
            thrust: c.ct * q * d.powi(4),
            torque: c.cq * q * d.powi(5),
            ct: c.ct,
            cq: c.cq,
        }
    }

    /// Static (zero inflow) thrust at a rotor speed [rpm]
    pub fn thrust_from_rpm(&self, rpm: f64) -> f64 {
        self.thrust_and_torque(rpm, 0.0).thrust
    }

    /// Rotor speed [rpm] producing a thrust in still air
    ///
    /// Inverts the static model with Ct0; induced inflow is ignored.
    pub fn rpm_from_thrust(&self, thrust: f64) -> f64 {
        let thrust = thrust.max(0.0);
        let ct = self.prop.ct0.max(1e-6);
        let n = (thrust / (ct * self.air_density * self.prop.diameter.powi(4))).sqrt();
        n * 60.0
    }

    /// Largest thrust a single rotor can produce [N]
    pub fn max_thrust_per_rotor(&self) -> f64 {
        self.thrust_from_rpm(self.max_rpm)
    }

    /// Largest collective thrust of all rotors [N]
    pub fn max_collective(&self) -> f64 {
        ROTOR_COUNT as f64 * self.max_thrust_per_rotor()
    }
}

/// Piecewise-linear interpolation, clamped to the end values
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }

    // first sample strictly above x
    let hi = xs[..n].partition_point(|&v| v <= x).min(n - 1);
    let lo = hi - 1;
    let span = xs[hi] - xs[lo];
    if span <= 0.0 {
        return ys[lo];
    }
    let t = (x - xs[lo]) / span;
    ys[lo] + t * (ys[hi] - ys[lo])
}
