//! Vehicle dynamics
//!
//! - Propeller thrust/torque model over advance ratio
//! - Rotor-driven rigid-body step with motor lag and ground contact

pub mod propulsion;
pub mod quadrotor;

pub use propulsion::*;
pub use quadrotor::*;
