//! Airframe description
//!
//! [`AirframeSpec`] is the static physical specification document loaded once
//! at startup; [`Airframe`] holds the constants derived from it and is shared
//! read-only by physics, propulsion, mixer and sensors.

pub mod spec;
pub mod params;

pub use spec::*;
pub use params::*;
