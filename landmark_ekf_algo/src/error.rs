//! Error types for the landmark EKF.

use thiserror::Error;

use crate::slam::StepPhase;

/// Errors raised while running the filter.
///
/// Only [`SlamError::SingularInnovationCovariance`] and
/// [`SlamError::DegenerateRange`] are recoverable: the step driver skips the
/// offending observation and keeps going. Everything else aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlamError {
    #[error(
        "stream length mismatch: {motions} motion records and {measurements} measurement lists for {steps} steps"
    )]
    DimensionMismatch {
        steps: usize,
        motions: usize,
        measurements: usize,
    },

    #[error("innovation covariance is singular (det = {determinant})")]
    SingularInnovationCovariance { determinant: f32 },

    #[error("degenerate range {range} to landmark at state index {index}")]
    DegenerateRange { index: usize, range: f32 },

    #[error(
        "state corrupted while {phase}: mean has {mean_len} entries, covariance is {cov_rows}x{cov_cols}, {landmarks} landmarks"
    )]
    StateCorruption {
        phase: StepPhase,
        mean_len: usize,
        cov_rows: usize,
        cov_cols: usize,
        landmarks: usize,
    },

    #[error("landmark state index {index} outside state of dimension {dim}")]
    IndexOutOfRange { index: usize, dim: usize },
}

impl SlamError {
    /// Whether the run may continue after skipping the current observation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SlamError::SingularInnovationCovariance { .. } | SlamError::DegenerateRange { .. }
        )
    }
}

/// Configuration load error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SlamError>;
