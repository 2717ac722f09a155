//! Run configuration file.
//!
//! ```toml
//! [filter]
//! motion_noise = 0.1
//! correction_mode = "standard"
//!
//! [simulation]
//! steps = 200
//! landmarks = 20
//! seed = 7
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use landmark_ekf_algo::config::EkfSlamConfig;
use serde::{Deserialize, Serialize};

use crate::world::SimulationConfig;

/// Filter and simulation settings for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub filter: EkfSlamConfig,
    pub simulation: SimulationConfig,
}

impl RunConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml).context("failed to parse run config")?;
        config.filter.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landmark_ekf_algo::config::CorrectionMode;

    #[test]
    fn test_partial_file() {
        let config = RunConfig::from_toml_str(
            r#"
            [filter]
            correction_mode = "standard"
            association_threshold = 2.5

            [simulation]
            steps = 200
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.filter.correction_mode, CorrectionMode::Standard);
        assert_eq!(config.filter.association_threshold, 2.5);
        assert_eq!(config.filter.motion_noise, EkfSlamConfig::default().motion_noise);
        assert_eq!(config.simulation.steps, 200);
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.world_size, SimulationConfig::default().world_size);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        assert!(RunConfig::from_toml_str("[filter]\nrange_noise = -1.0\n").is_err());
    }
}
