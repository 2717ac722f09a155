//! Motion and measurement streams saved as JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use landmark_ekf_algo::slam::{MotionRecord, Observation};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// True poses and landmark positions behind a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Pose after each step
    pub poses: Vec<Vector3<f32>>,
    pub landmarks: Vec<Vector2<f32>>,
}

/// Input streams for one filter run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub motions: Vec<MotionRecord>,
    /// One list of observations per step, possibly empty
    pub measurements: Vec<Vec<Observation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<GroundTruth>,
}

impl Recording {
    /// Number of steps held
    pub fn steps(&self) -> usize {
        self.motions.len()
    }

    /// Keep only the first `steps` steps.
    pub fn truncate(&mut self, steps: usize) {
        self.motions.truncate(steps);
        self.measurements.truncate(steps);
        if let Some(truth) = self.truth.as_mut() {
            truth.poses.truncate(steps);
        }
    }

    /// Check that the streams line up step for step.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.motions.len() == self.measurements.len(),
            "recording has {} motion records but {} measurement lists",
            self.motions.len(),
            self.measurements.len()
        );
        if let Some(truth) = &self.truth {
            ensure!(
                truth.poses.len() == self.motions.len(),
                "recording has {} true poses for {} steps",
                truth.poses.len(),
                self.motions.len()
            );
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let recording: Self = serde_json::from_str(json).context("failed to parse recording")?;
        recording.validate()?;
        Ok(recording)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let recording: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse {}", path.display()))?;
        recording.validate()?;
        Ok(recording)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .with_context(|| format!("failed to write {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Recording {
        Recording {
            motions: vec![MotionRecord::new(1.0, 0.0, 0.0), MotionRecord::new(1.0, 0.0, 0.5)],
            measurements: vec![vec![Observation::new(5.0, 0.1)], vec![]],
            truth: None,
        }
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{
            "motions": [{"forward": 1.0, "dtheta": 0.0}],
            "measurements": [[{"range": 5.0, "bearing": 0.0}]]
        }"#;
        let recording = Recording::from_json_str(json).unwrap();
        assert_eq!(recording.steps(), 1);
        assert_eq!(recording.motions[0], MotionRecord::new(1.0, 0.0, 0.0));
        assert!(recording.truth.is_none());
    }

    #[test]
    fn test_mismatched_streams_rejected() {
        let json = r#"{"motions": [{"forward": 1.0, "dtheta": 0.0}], "measurements": []}"#;
        assert!(Recording::from_json_str(json).is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("landmark_ekf_recording_{}.json", std::process::id()));
        let recording = sample();
        recording.save(&path).unwrap();
        let loaded = Recording::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, recording);
    }

    #[test]
    fn test_truncate() {
        let mut recording = sample();
        recording.truncate(1);
        assert_eq!(recording.steps(), 1);
        assert_eq!(recording.measurements.len(), 1);
    }
}
