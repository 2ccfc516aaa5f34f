//! PID attitude controller
//!
//! Each axis runs an independent PID on the wrapped angle error. The update
//! is a pure function over a plain state struct; [`PidController`] bundles
//! gains and state for callers that want an object.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Lower bound on dt when differentiating the error [s]
const MIN_DERIVATIVE_DT: f64 = 1e-5;

/// Control axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
        }
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roll" => Ok(Axis::Roll),
            "pitch" => Ok(Axis::Pitch),
            "yaw" => Ok(Axis::Yaw),
            other => Err(format!("unknown axis '{other}'")),
        }
    }
}

/// PID gains and limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Weight of the previous derivative in the low-pass filter
    pub derivative_alpha: f64,
    /// Symmetric bound on the integral term
    pub integral_limit: f64,
    /// Symmetric bound on the output
    pub output_limit: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64, output_limit: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_limit,
            ..Default::default()
        }
    }

    /// Default roll/pitch gains
    pub fn tilt() -> Self {
        Self::new(4.0, 0.5, 1.5, 0.8)
    }

    /// Default yaw gains
    pub fn yaw() -> Self {
        Self::new(2.0, 0.3, 0.8, 0.4)
    }

    /// Overwrite the fields present in `update`; non-finite values are skipped
    pub fn apply(&mut self, update: &PidGainsUpdate) {
        let fields = [
            (&mut self.kp, update.kp),
            (&mut self.ki, update.ki),
            (&mut self.kd, update.kd),
            (&mut self.derivative_alpha, update.derivative_alpha),
            (&mut self.integral_limit, update.integral_limit),
            (&mut self.output_limit, update.output_limit),
        ];
        for (slot, value) in fields {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                *slot = v;
            }
        }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            derivative_alpha: 0.8,
            integral_limit: 10.0,
            output_limit: 10.0,
        }
    }
}

/// Partial gain update, absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGainsUpdate {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub derivative_alpha: Option<f64>,
    pub integral_limit: Option<f64>,
    pub output_limit: Option<f64>,
}

/// Controller memory between updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidState {
    pub integral: f64,
    pub prev_error: f64,
    /// Filtered derivative
    pub derivative: f64,
    pub last_output: f64,
}

/// One PID update
///
/// integral += e·dt·ki (clamped), derivative is low-pass filtered with
/// `derivative_alpha`, output = kp·e + integral + kd·derivative (clamped).
pub fn pid_step(gains: &PidGains, state: &PidState, error: f64, dt: f64) -> (PidState, f64) {
    let integral = clamp_symmetric(state.integral + error * dt * gains.ki, gains.integral_limit);

    let raw_derivative = (error - state.prev_error) / dt.max(MIN_DERIVATIVE_DT);
    let derivative =
        gains.derivative_alpha * state.derivative + (1.0 - gains.derivative_alpha) * raw_derivative;

    let output = clamp_symmetric(
        gains.kp * error + integral + gains.kd * derivative,
        gains.output_limit,
    );

    let next = PidState {
        integral,
        prev_error: error,
        derivative,
        last_output: output,
    };
    (next, output)
}

/// Clamp to [-|limit|, |limit|] without panicking on odd limits
fn clamp_symmetric(value: f64, limit: f64) -> f64 {
    let limit = limit.abs();
    value.max(-limit).min(limit)
}

/// PID gains with their running state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidController {
    pub gains: PidGains,
    pub state: PidState,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            state: PidState::default(),
        }
    }

    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        let (state, output) = pid_step(&self.gains, &self.state, error, dt);
        self.state = state;
        output
    }

    /// Change gains, keeping accumulated state
    pub fn set_gains(&mut self, update: &PidGainsUpdate) {
        self.gains.apply(update);
    }

    pub fn reset(&mut self) {
        self.state = PidState::default();
    }
}

/// Roll, pitch and yaw controllers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudePid {
    pub roll: PidController,
    pub pitch: PidController,
    pub yaw: PidController,
}

impl AttitudePid {
    pub fn new(gains: &AttitudeGains) -> Self {
        Self {
            roll: PidController::new(gains.roll),
            pitch: PidController::new(gains.pitch),
            yaw: PidController::new(gains.yaw),
        }
    }

    pub fn reset(&mut self) {
        for axis in Axis::ALL {
            self[axis].reset();
        }
    }

    pub fn gains(&self) -> AttitudeGains {
        AttitudeGains {
            roll: self.roll.gains,
            pitch: self.pitch.gains,
            yaw: self.yaw.gains,
        }
    }
}

impl Default for AttitudePid {
    fn default() -> Self {
        Self::new(&AttitudeGains::default())
    }
}

impl Index<Axis> for AttitudePid {
    type Output = PidController;

    fn index(&self, axis: Axis) -> &PidController {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
        }
    }
}

impl IndexMut<Axis> for AttitudePid {
    fn index_mut(&mut self, axis: Axis) -> &mut PidController {
        match axis {
            Axis::Roll => &mut self.roll,
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
        }
    }
}

/// Gains for all three axes
///
/// When deserialized, each axis starts from its default gains and takes only
/// the fields present in the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttitudeGainsDocument")]
pub struct AttitudeGains {
    pub roll: PidGains,
    pub pitch: PidGains,
    pub yaw: PidGains,
}

/// Partial per-axis gains as found in configuration files
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AttitudeGainsDocument {
    roll: PidGainsUpdate,
    pitch: PidGainsUpdate,
    yaw: PidGainsUpdate,
}

impl From<AttitudeGainsDocument> for AttitudeGains {
    fn from(doc: AttitudeGainsDocument) -> Self {
        let mut gains = AttitudeGains::default();
        gains.roll.apply(&doc.roll);
        gains.pitch.apply(&doc.pitch);
        gains.yaw.apply(&doc.yaw);
        gains
    }
}

impl Default for AttitudeGains {
    fn default() -> Self {
        Self {
            roll: PidGains::tilt(),
            pitch: PidGains::tilt(),
            yaw: PidGains::yaw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_gains() {
        let gains = AttitudeGains::default();

        assert_eq!(gains.roll.kp, 4.0);
        assert_eq!(gains.pitch.kd, 1.5);
        assert_eq!(gains.yaw.output_limit, 0.4);
        assert_eq!(gains.yaw.integral_limit, 10.0);
        assert_eq!(gains.roll.derivative_alpha, 0.8);
    }

    #[test]
    fn test_first_step_values() {
        let gains = PidGains::new(2.0, 1.0, 0.5, 100.0);
        let (state, out) = pid_step(&gains, &PidState::default(), 0.1, 0.01);

        // integral = 0.1 * 0.01 * 1.0, raw derivative = 10, filtered = 0.2 * 10
        assert_relative_eq!(state.integral, 0.001, epsilon = 1e-12);
        assert_relative_eq!(state.derivative, 2.0, epsilon = 1e-12);
        assert_relative_eq!(out, 0.2 + 0.001 + 1.0, epsilon = 1e-12);
        assert_eq!(state.prev_error, 0.1);
        assert_eq!(state.last_output, out);
    }

    #[test]
    fn test_output_clamped() {
        let gains = PidGains::tilt();
        let mut pid = PidController::new(gains);

        for error in [100.0, -100.0, 3.0, -0.5, 1e9] {
            let out = pid.update(error, 0.005);
            assert!(out.abs() <= gains.output_limit);
        }
    }

    #[test]
    fn test_integral_clamped() {
        let gains = PidGains {
            ki: 50.0,
            integral_limit: 0.3,
            ..PidGains::tilt()
        };
        let mut pid = PidController::new(gains);

        for _ in 0..1000 {
            pid.update(1.0, 0.01);
            assert!(pid.state.integral.abs() <= 0.3);
        }
        assert_relative_eq!(pid.state.integral, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_tiny_dt_does_not_blow_up() {
        let gains = PidGains::tilt();
        let (state, out) = pid_step(&gains, &PidState::default(), 1.0, 0.0);

        assert!(state.derivative.is_finite());
        assert!(out.is_finite());
    }

    #[test]
    fn test_negative_limit_does_not_panic() {
        let gains = PidGains {
            output_limit: -0.5,
            ..PidGains::tilt()
        };
        let (_, out) = pid_step(&gains, &PidState::default(), 10.0, 0.01);

        assert_eq!(out, 0.5);
    }

    #[test]
    fn test_gain_update_skips_missing_and_non_finite() {
        let mut pid = PidController::new(PidGains::tilt());
        pid.update(0.3, 0.01);
        let state = pid.state;

        pid.set_gains(&PidGainsUpdate {
            kp: Some(7.0),
            kd: Some(f64::NAN),
            ..Default::default()
        });

        assert_eq!(pid.gains.kp, 7.0);
        assert_eq!(pid.gains.kd, 1.5);
        assert_eq!(pid.gains.ki, 0.5);
        // state survives a gain change
        assert_eq!(pid.state, state);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut set = AttitudePid::default();
        set[Axis::Yaw].update(0.5, 0.01);
        assert_ne!(set.yaw.state, PidState::default());

        set.reset();
        for axis in Axis::ALL {
            assert_eq!(set[axis].state, PidState::default());
        }
    }

    #[test]
    fn test_axis_parse() {
        assert_eq!("Roll".parse::<Axis>(), Ok(Axis::Roll));
        assert_eq!("yaw".parse::<Axis>(), Ok(Axis::Yaw));
        assert!("thrust".parse::<Axis>().is_err());
        assert_eq!(Axis::Pitch.name(), "pitch");
    }

    #[test]
    fn test_partial_attitude_gains_keep_axis_defaults() {
        let gains: AttitudeGains =
            serde_json::from_str(r#"{"roll": {"kp": 5.0}, "yaw": {"output_limit": 0.6}}"#).unwrap();

        assert_eq!(gains.roll.kp, 5.0);
        assert_eq!(gains.roll.kd, 1.5);
        assert_eq!(gains.roll.output_limit, 0.8);
        assert_eq!(gains.pitch, PidGains::tilt());
        assert_eq!(gains.yaw.output_limit, 0.6);
        assert_eq!(gains.yaw.kp, 2.0);
    }

    #[test]
    fn test_attitude_gains_json_round_trip() {
        let mut gains = AttitudeGains::default();
        gains.pitch.ki = 0.9;
        let text = serde_json::to_string(&gains).unwrap();

        assert_eq!(serde_json::from_str::<AttitudeGains>(&text).unwrap(), gains);
    }

    #[test]
    fn test_partial_pid_gains_json() {
        let gains: PidGains = serde_json::from_str(r#"{"kp": 3.0}"#).unwrap();

        assert_eq!(gains.kp, 3.0);
        assert_eq!(gains.derivative_alpha, 0.8);
        assert_eq!(gains.integral_limit, 10.0);
    }

    #[test]
    fn test_gains_update_json() {
        let update: PidGainsUpdate = serde_json::from_str(r#"{"kp": 3.0}"#).unwrap();

        assert_eq!(update.kp, Some(3.0));
        assert_eq!(update.ki, None);
    }
}
