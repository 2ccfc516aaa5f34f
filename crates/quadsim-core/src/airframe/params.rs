//! Derived airframe constants

use std::f64::consts::{PI, SQRT_2};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::spec::AirframeSpec;
use crate::error::ConfigError;
use crate::ROTOR_COUNT;

/// Lower bound on the first-order motor time constant [s]
pub const MIN_MOTOR_TIME_CONSTANT: f64 = 0.002;

/// Rotor speed never exceeds this multiple of the hover speed
pub const MAX_RPM_HOVER_RATIO: f64 = 2.8;

/// Rotor spin directions (+1 counter-clockwise seen from above)
///
/// Rotors are numbered front-right, rear-right, rear-left, front-left.
pub const SPIN_DIRECTIONS: [f64; ROTOR_COUNT] = [-1.0, 1.0, -1.0, 1.0];

/// Propeller geometry and aerodynamic tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropellerParams {
    /// Diameter [m]
    pub diameter: f64,
    /// Static thrust coefficient
    pub ct0: f64,
    /// Static torque coefficient
    pub cq0: f64,
    /// Advance ratio samples, strictly increasing
    pub advance_ratios: Vec<f64>,
    pub ct_table: Vec<f64>,
    pub cq_table: Vec<f64>,
}

/// Physical constants shared read-only by every subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airframe {
    /// Mass [kg]
    pub mass: f64,
    /// Principal moments of inertia (Ixx, Iyy, Izz) [kg·m²]
    pub inertia: Vector3<f64>,
    /// Gravitational acceleration [m/s²]
    pub gravity: f64,
    /// Air density [kg/m³]
    pub air_density: f64,
    /// Altitude clamp for range sensors [m]
    pub field_height: f64,
    /// Motor-to-motor diagonal [m]
    pub wheelbase: f64,
    /// Per-axis offset of each rotor from the centre, wheelbase / (2√2) [m]
    pub arm_offset: f64,
    /// Rotor hub positions in the body frame
    pub rotor_positions: [Vector3<f64>; ROTOR_COUNT],
    /// Reaction torque per unit thrust, Cq0·D / Ct0 [m]
    pub yaw_torque_factor: f64,
    /// Rotor speed ceiling, min(kv · nominal voltage, 2.8 · hover) [rpm]
    pub max_rpm: f64,
    /// Nominal hover rotor speed [rpm]
    pub hover_rpm: f64,
    /// First-order motor lag time constant [s]
    pub motor_time_constant: f64,
    pub propeller: PropellerParams,
}

impl AirframeSpec {
    /// Validate the document and derive the physical constants
    pub fn to_params(&self) -> Result<Airframe, ConfigError> {
        self.validate()?;
        Ok(Airframe::derive(self))
    }
}

impl Airframe {
    /// Build the derived constants from a specification document
    pub fn from_spec(spec: &AirframeSpec) -> Result<Self, ConfigError> {
        spec.to_params()
    }

    fn derive(spec: &AirframeSpec) -> Self {
        let wheelbase = spec.airframe.wheelbase_m_est;
        let arm_offset = wheelbase / (2.0 * SQRT_2);
        let a = arm_offset;

        let diameter = spec.components.propellers.diameter_m;
        let coeffs = &spec.propulsion_model.aero_coeffs_assumed;
        let table = &spec.propulsion_model.ct_cq_table;

        let bandwidth = spec.control_limits.rate_controller_bandwidth_hz_est;
        let motor_time_constant = (1.0 / (2.0 * PI * bandwidth)).max(MIN_MOTOR_TIME_CONSTANT);

        let hover_rpm = spec.performance_targets.hover.hover_rpm;
        let electrical_rpm =
            spec.components.motors.kv_rpm_per_v * spec.components.battery.nominal_voltage_v;

        Self {
            mass: spec.mass_breakdown.auw_kg,
            inertia: Vector3::new(
                spec.inertia_estimates.ixx_kgm2_est,
                spec.inertia_estimates.iyy_kgm2_est,
                spec.inertia_estimates.izz_kgm2_est,
            ),
            gravity: spec.environment_model.gravity_mps2,
            air_density: spec.environment_model.rho0_kg_per_m3,
            field_height: spec.environment_model.field_height_m,
            wheelbase,
            arm_offset,
            rotor_positions: [
                Vector3::new(a, a, 0.0),
                Vector3::new(a, -a, 0.0),
                Vector3::new(-a, -a, 0.0),
                Vector3::new(-a, a, 0.0),
            ],
            yaw_torque_factor: coeffs.c_q0 * diameter / coeffs.c_t0,
            max_rpm: electrical_rpm.min(MAX_RPM_HOVER_RATIO * hover_rpm),
            hover_rpm,
            motor_time_constant,
            propeller: PropellerParams {
                diameter,
                ct0: coeffs.c_t0,
                cq0: coeffs.c_q0,
                advance_ratios: table.j.clone(),
                ct_table: table.c_t.clone(),
                cq_table: table.c_q.clone(),
            },
        }
    }

    /// Weight force m·g [N]
    pub fn weight(&self) -> f64 {
        self.mass * self.gravity
    }
}

impl Default for Airframe {
    fn default() -> Self {
        Self::derive(&AirframeSpec::default())
    }
}
