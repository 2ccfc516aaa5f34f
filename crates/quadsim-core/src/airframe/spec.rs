//! Airframe specification document
//!
//! Mirrors the structured JSON dataset describing the vehicle. Field names
//! follow the document keys so existing datasets load unchanged.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ROTOR_COUNT;

/// Physical specification of the vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirframeSpec {
    pub environment_model: EnvironmentModel,
    pub airframe: FrameGeometry,
    pub mass_breakdown: MassBreakdown,
    pub inertia_estimates: InertiaEstimates,
    pub components: Components,
    pub propulsion_model: PropulsionModel,
    pub performance_targets: PerformanceTargets,
    pub control_limits: ControlLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentModel {
    /// Gravitational acceleration [m/s²]
    pub gravity_mps2: f64,
    /// Sea-level air density [kg/m³]
    pub rho0_kg_per_m3: f64,
    /// Height of the flying field used to clamp altitude readings [m]
    #[serde(default = "default_field_height")]
    pub field_height_m: f64,
}

fn default_field_height() -> f64 {
    50.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    /// Motor-to-motor diagonal distance [m]
    pub wheelbase_m_est: f64,
    pub rotor_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassBreakdown {
    /// All-up weight [kg]
    pub auw_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InertiaEstimates {
    #[serde(rename = "Ixx_kgm2_est")]
    pub ixx_kgm2_est: f64,
    #[serde(rename = "Iyy_kgm2_est")]
    pub iyy_kgm2_est: f64,
    #[serde(rename = "Izz_kgm2_est")]
    pub izz_kgm2_est: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub propellers: Propellers,
    pub motors: Motors,
    pub battery: Battery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propellers {
    pub diameter_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motors {
    #[serde(rename = "kv_rpm_per_V")]
    pub kv_rpm_per_v: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    #[serde(rename = "nominal_voltage_V")]
    pub nominal_voltage_v: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropulsionModel {
    pub aero_coeffs_assumed: AeroCoefficients,
    pub ct_cq_table: CoefficientTable,
}

/// Static (zero-airflow) thrust and torque coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeroCoefficients {
    #[serde(rename = "C_T0")]
    pub c_t0: f64,
    #[serde(rename = "C_Q0")]
    pub c_q0: f64,
}

/// Thrust/torque coefficients sampled against advance ratio J
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTable {
    #[serde(rename = "J")]
    pub j: Vec<f64>,
    #[serde(rename = "C_T")]
    pub c_t: Vec<f64>,
    #[serde(rename = "C_Q")]
    pub c_q: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTargets {
    pub hover: HoverTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverTarget {
    pub hover_rpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    pub rate_controller_bandwidth_hz_est: f64,
}

impl Default for AirframeSpec {
    /// 650 mm X-frame on 13" propellers and 6S power
    fn default() -> Self {
        Self {
            environment_model: EnvironmentModel {
                gravity_mps2: crate::GRAVITY,
                rho0_kg_per_m3: 1.225,
                field_height_m: default_field_height(),
            },
            airframe: FrameGeometry {
                wheelbase_m_est: 0.65,
                rotor_count: ROTOR_COUNT,
            },
            mass_breakdown: MassBreakdown { auw_kg: 2.2 },
            inertia_estimates: InertiaEstimates {
                ixx_kgm2_est: 0.05,
                iyy_kgm2_est: 0.05,
                izz_kgm2_est: 0.09,
            },
            components: Components {
                propellers: Propellers { diameter_m: 0.33 },
                motors: Motors { kv_rpm_per_v: 400.0 },
                battery: Battery { nominal_voltage_v: 22.2 },
            },
            propulsion_model: PropulsionModel {
                aero_coeffs_assumed: AeroCoefficients {
                    c_t0: 0.11,
                    c_q0: 0.0065,
                },
                ct_cq_table: CoefficientTable {
                    j: vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
                    c_t: vec![0.11, 0.105, 0.097, 0.086, 0.072, 0.055, 0.035],
                    c_q: vec![0.0065, 0.0064, 0.0062, 0.0058, 0.0052, 0.0044, 0.0034],
                },
            },
            performance_targets: PerformanceTargets {
                hover: HoverTarget { hover_rpm: 3490.0 },
            },
            control_limits: ControlLimits {
                rate_controller_bandwidth_hz_est: 20.0,
            },
        }
    }
}

impl AirframeSpec {
    /// Parse a specification from JSON text and validate it
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let spec: Self = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load and validate a specification file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check physical plausibility of every value the derivation relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("environment_model.gravity_mps2", self.environment_model.gravity_mps2),
            ("environment_model.rho0_kg_per_m3", self.environment_model.rho0_kg_per_m3),
            ("environment_model.field_height_m", self.environment_model.field_height_m),
            ("airframe.wheelbase_m_est", self.airframe.wheelbase_m_est),
            ("mass_breakdown.auw_kg", self.mass_breakdown.auw_kg),
            ("inertia_estimates.Ixx_kgm2_est", self.inertia_estimates.ixx_kgm2_est),
            ("inertia_estimates.Iyy_kgm2_est", self.inertia_estimates.iyy_kgm2_est),
            ("inertia_estimates.Izz_kgm2_est", self.inertia_estimates.izz_kgm2_est),
            ("components.propellers.diameter_m", self.components.propellers.diameter_m),
            ("components.motors.kv_rpm_per_V", self.components.motors.kv_rpm_per_v),
            ("components.battery.nominal_voltage_V", self.components.battery.nominal_voltage_v),
            ("propulsion_model.aero_coeffs_assumed.C_T0", self.propulsion_model.aero_coeffs_assumed.c_t0),
            ("performance_targets.hover.hover_rpm", self.performance_targets.hover.hover_rpm),
            (
                "control_limits.rate_controller_bandwidth_hz_est",
                self.control_limits.rate_controller_bandwidth_hz_est,
            ),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }

        if !self.propulsion_model.aero_coeffs_assumed.c_q0.is_finite() {
            return Err(ConfigError::Invalid(
                "propulsion_model.aero_coeffs_assumed.C_Q0 must be finite".into(),
            ));
        }

        if self.airframe.rotor_count != ROTOR_COUNT {
            return Err(ConfigError::Invalid(format!(
                "only {ROTOR_COUNT}-rotor X frames are supported, got {} rotors",
                self.airframe.rotor_count
            )));
        }

        self.propulsion_model.ct_cq_table.validate()
    }
}

impl CoefficientTable {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.j.is_empty() {
            return Err(ConfigError::Invalid("ct_cq_table.J is empty".into()));
        }
        if self.c_t.len() != self.j.len() || self.c_q.len() != self.j.len() {
            return Err(ConfigError::Invalid(format!(
                "ct_cq_table length mismatch: J={}, C_T={}, C_Q={}",
                self.j.len(),
                self.c_t.len(),
                self.c_q.len()
            )));
        }
        if self.j.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ConfigError::Invalid(
                "ct_cq_table.J must be strictly increasing".into(),
            ));
        }
        if self.j.iter().chain(&self.c_t).chain(&self.c_q).any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid(
                "ct_cq_table contains non-finite values".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_is_valid() {
        assert!(AirframeSpec::default().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_keeps_document_keys() {
        let spec = AirframeSpec::default();
        let text = serde_json::to_string(&spec).unwrap();

        assert!(text.contains("\"Ixx_kgm2_est\""));
        assert!(text.contains("\"kv_rpm_per_V\""));
        assert!(text.contains("\"C_T0\""));

        let parsed = AirframeSpec::from_json_str(&text).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_field_height_defaults_when_missing() {
        let mut value = serde_json::to_value(AirframeSpec::default()).unwrap();
        value["environment_model"]
            .as_object_mut()
            .unwrap()
            .remove("field_height_m");

        let parsed = AirframeSpec::from_json_str(&value.to_string()).unwrap();
        assert_eq!(parsed.environment_model.field_height_m, 50.0);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = AirframeSpec::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AirframeSpec::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_rejects_non_positive_mass() {
        let mut spec = AirframeSpec::default();
        spec.mass_breakdown.auw_kg = 0.0;

        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("auw_kg"));
    }

    #[test]
    fn test_rejects_wrong_rotor_count() {
        let mut spec = AirframeSpec::default();
        spec.airframe.rotor_count = 6;

        assert!(matches!(spec.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_tables() {
        let mut spec = AirframeSpec::default();
        spec.propulsion_model.ct_cq_table.c_q.pop();
        assert!(spec.validate().is_err());

        let mut spec = AirframeSpec::default();
        spec.propulsion_model.ct_cq_table.j[2] = 0.1;
        assert!(spec.validate().is_err());

        let mut spec = AirframeSpec::default();
        spec.propulsion_model.ct_cq_table = CoefficientTable {
            j: vec![],
            c_t: vec![],
            c_q: vec![],
        };
        assert!(spec.validate().is_err());
    }
}
