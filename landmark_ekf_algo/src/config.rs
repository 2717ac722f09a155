//! Filter configuration.
//!
//! Every field has a serde default, so a TOML file only needs to name the
//! values it changes:
//!
//! ```toml
//! motion_noise = 0.1
//! range_noise = 0.1
//! bearing_noise = 0.1
//! association_threshold = 4.0   # squared distance
//! correction_mode = "reference" # or "standard"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

mod defaults {
    pub fn motion_noise() -> f32 {
        0.1
    }

    pub fn range_noise() -> f32 {
        0.1
    }

    pub fn bearing_noise() -> f32 {
        0.1
    }

    pub fn association_threshold() -> f32 {
        4.0
    }

    pub fn landmark_capacity() -> usize {
        32
    }

    pub fn degenerate_range() -> f32 {
        1e-6
    }
}

/// How a matched observation corrects the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// Mean-only update. The innovation is the stored landmark's range and
    /// world bearing minus the candidate's, and landmarks discovered in the
    /// same step get no cross-covariance with each other.
    #[default]
    Reference,
    /// Textbook EKF update: innovation is observed minus predicted, the
    /// covariance is contracted with `P - K H P`, and same-step landmarks are
    /// correlated through the shared pose.
    Standard,
}

/// EKF-SLAM configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfSlamConfig {
    /// Process noise coefficient `c` in `Q = c * d d^T`
    pub motion_noise: f32,
    /// Range variance per meter of range
    pub range_noise: f32,
    /// Bearing variance (rad^2)
    pub bearing_noise: f32,
    /// Squared world distance under which an observation re-observes a landmark
    pub association_threshold: f32,
    /// Initial robot x
    pub initial_x: f32,
    /// Initial robot y
    pub initial_y: f32,
    /// Initial robot heading
    pub initial_heading: f32,
    /// Correction behaviour
    pub correction_mode: CorrectionMode,
    /// Number of landmarks to reserve storage for up front
    pub landmark_capacity: usize,
    /// Ranges at or below this are treated as degenerate
    pub degenerate_range: f32,
}

impl Default for EkfSlamConfig {
    fn default() -> Self {
        Self {
            motion_noise: defaults::motion_noise(),
            range_noise: defaults::range_noise(),
            bearing_noise: defaults::bearing_noise(),
            association_threshold: defaults::association_threshold(),
            initial_x: 0.0,
            initial_y: 0.0,
            initial_heading: 0.0,
            correction_mode: CorrectionMode::default(),
            landmark_capacity: defaults::landmark_capacity(),
            degenerate_range: defaults::degenerate_range(),
        }
    }
}

impl EkfSlamConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate from a TOML string
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style override of the correction mode
    pub fn with_mode(mut self, mode: CorrectionMode) -> Self {
        self.correction_mode = mode;
        self
    }

    /// Builder-style override of all three noise coefficients
    pub fn with_noise(mut self, motion: f32, range: f32, bearing: f32) -> Self {
        self.motion_noise = motion;
        self.range_noise = range;
        self.bearing_noise = bearing;
        self
    }

    /// Reject values the filter cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("motion_noise", self.motion_noise),
            ("range_noise", self.range_noise),
            ("bearing_noise", self.bearing_noise),
            ("degenerate_range", self.degenerate_range),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.association_threshold.is_finite() || self.association_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "association_threshold must be positive, got {}",
                self.association_threshold
            )));
        }
        let pose = [self.initial_x, self.initial_y, self.initial_heading];
        if pose.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid("initial pose must be finite".to_string()));
        }
        Ok(())
    }
}
