//! Error types for model operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or running the thermal model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Floorplan {source_name}, line {line}: {reason}")]
    Floorplan {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid geometry: {what}")]
    InvalidGeometry { what: String },

    #[error("Model not ready: {what} must be populated first")]
    NotPopulated { what: &'static str },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Too high power for a natural convection package -- possible thermal runaway (sink at {sink_temp:.2} K)")]
    ThermalRunaway { sink_temp: f64 },

    #[error("Temperature file {path}: {reason}")]
    TempFile { path: PathBuf, reason: String },

    #[error("Core error: {0}")]
    Core(#[from] hs_core::HsError),
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::Io {
            path: path.into(),
            source,
        }
    }
}
