//! Configuration errors
//!
//! The simulation loop itself never fails; only loading and validating the
//! airframe document can.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed airframe document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid airframe: {0}")]
    Invalid(String),
}
