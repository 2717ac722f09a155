//! Step driver tying the filter stages together.
//!
//! Every step runs the same fixed sequence:
//!
//! ```text
//! Predicting -> (no observations) ----------------------------------> Emitting
//! Predicting -> Associating -> Correcting -> Augmenting -> Emitting
//! ```
//!
//! The only state carried between steps is the mean and covariance owned by
//! [`EkfSlam`]. Each run owns its own instance, so independent runs never
//! interfere.

use std::fmt;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, trace};

use super::association::{associate, CandidateKind};
use super::augment::augment;
use super::correction::correct;
use super::predict::predict;
use super::state::{SlamState, POSE_DIM};
use super::types::{MotionRecord, Observation};
use crate::config::EkfSlamConfig;
use crate::error::{Result, SlamError};

/// Phases of a filter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepPhase {
    Predicting,
    Associating,
    Correcting,
    Augmenting,
    Emitting,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Predicting => "predicting",
            StepPhase::Associating => "associating",
            StepPhase::Correcting => "correcting",
            StepPhase::Augmenting => "augmenting",
            StepPhase::Emitting => "emitting",
        };
        f.write_str(name)
    }
}

/// Mean state after a step: pose followed by landmarks in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// Zero-based step number
    pub step: usize,
    /// Full mean vector [x, y, θ, m1_x, m1_y, ...]
    pub mean: Vec<f32>,
}

impl StepSnapshot {
    /// Pose [x, y, θ], or `None` if the mean is too short to hold one
    pub fn pose(&self) -> Option<Vector3<f32>> {
        self.mean.get(..POSE_DIM).map(Vector3::from_column_slice)
    }

    pub fn landmark_count(&self) -> usize {
        self.mean.len().saturating_sub(POSE_DIM) / 2
    }

    pub fn landmarks(&self) -> impl Iterator<Item = Vector2<f32>> + '_ {
        self.mean
            .get(POSE_DIM..)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|xy| Vector2::new(xy[0], xy[1]))
    }
}

/// What happened during one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub snapshot: StepSnapshot,
    /// Observations classified as re-observations
    pub matched: usize,
    /// Corrections applied
    pub corrections: usize,
    /// Corrections skipped on a degenerate range or singular innovation
    pub skipped_corrections: usize,
    /// Landmarks appended to the state
    pub landmarks_added: usize,
    /// Landmarks dropped on a degenerate range
    pub skipped_landmarks: usize,
}

/// Landmark EKF-SLAM filter for one run.
#[derive(Debug, Clone)]
pub struct EkfSlam {
    config: EkfSlamConfig,
    state: SlamState,
    steps: usize,
}

impl EkfSlam {
    /// Create a filter with the robot at the configured initial pose.
    pub fn new(config: EkfSlamConfig) -> Self {
        let state = SlamState::with_capacity(
            config.initial_x,
            config.initial_y,
            config.initial_heading,
            config.landmark_capacity,
        );
        Self {
            config,
            state,
            steps: 0,
        }
    }

    pub fn config(&self) -> &EkfSlamConfig {
        &self.config
    }

    pub fn state(&self) -> &SlamState {
        &self.state
    }

    /// Number of steps processed so far
    pub fn steps_taken(&self) -> usize {
        self.steps
    }

    /// Current mean as a snapshot
    pub fn snapshot(&self) -> StepSnapshot {
        StepSnapshot {
            step: self.steps.saturating_sub(1),
            mean: self.state.mean().iter().copied().collect(),
        }
    }

    /// Run one filter step.
    pub fn step(&mut self, motion: &MotionRecord, observations: &[Observation]) -> Result<StepReport> {
        let _span = debug_span!("step", step = self.steps).entered();
        let mut report = StepReport {
            snapshot: StepSnapshot {
                step: self.steps,
                mean: Vec::new(),
            },
            matched: 0,
            corrections: 0,
            skipped_corrections: 0,
            landmarks_added: 0,
            skipped_landmarks: 0,
        };

        trace!(phase = %StepPhase::Predicting);
        let prediction = predict(&mut self.state, motion, self.config.motion_noise);
        self.state.check_consistency(StepPhase::Predicting)?;

        if !observations.is_empty() {
            trace!(phase = %StepPhase::Associating, observations = observations.len());
            let associations = associate(&self.state, observations, self.config.association_threshold);
            report.matched = associations.matched.len();

            trace!(phase = %StepPhase::Correcting, matched = associations.matched.len());
            for candidate in &associations.matched {
                if let CandidateKind::Matched { index } = candidate.kind {
                    match correct(&mut self.state, index, candidate, &self.config) {
                        Ok(_) => report.corrections += 1,
                        Err(err) if err.is_recoverable() => {
                            debug!(%err, index, "skipping correction");
                            report.skipped_corrections += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            self.state.check_consistency(StepPhase::Correcting)?;

            trace!(phase = %StepPhase::Augmenting, new = associations.new.len());
            self.state.reserve(associations.new.len());
            for candidate in &associations.new {
                match augment(&mut self.state, candidate, &prediction, &self.config) {
                    Ok(_) => report.landmarks_added += 1,
                    Err(err) if err.is_recoverable() => {
                        debug!(%err, "skipping new landmark");
                        report.skipped_landmarks += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
            self.state.check_consistency(StepPhase::Augmenting)?;
        }

        trace!(phase = %StepPhase::Emitting, landmarks = self.state.landmark_count());
        report.snapshot.mean = self.state.mean().iter().copied().collect();
        self.steps += 1;
        Ok(report)
    }

    /// Run `num_steps` steps, handing each report to `sink` as it is produced.
    ///
    /// Both streams must hold exactly `num_steps` entries.
    pub fn run_with<M, F>(
        &mut self,
        motions: &[MotionRecord],
        measurements: &[M],
        num_steps: usize,
        mut sink: F,
    ) -> Result<()>
    where
        M: AsRef<[Observation]>,
        F: FnMut(&StepReport),
    {
        if motions.len() != num_steps || measurements.len() != num_steps {
            return Err(SlamError::DimensionMismatch {
                steps: num_steps,
                motions: motions.len(),
                measurements: measurements.len(),
            });
        }

        info!(
            steps = num_steps,
            mode = ?self.config.correction_mode,
            "running landmark EKF"
        );
        for (motion, observations) in motions.iter().zip(measurements) {
            let report = self.step(motion, observations.as_ref())?;
            sink(&report);
        }
        info!(
            landmarks = self.state.landmark_count(),
            dim = self.state.dim(),
            "run finished"
        );
        Ok(())
    }

    /// Run `num_steps` steps and collect every snapshot.
    pub fn run<M: AsRef<[Observation]>>(
        &mut self,
        motions: &[MotionRecord],
        measurements: &[M],
        num_steps: usize,
    ) -> Result<Vec<StepSnapshot>> {
        let mut snapshots = Vec::with_capacity(num_steps);
        self.run_with(motions, measurements, num_steps, |report| {
            snapshots.push(report.snapshot.clone())
        })?;
        Ok(snapshots)
    }
}

/// Run a fresh filter over complete streams.
pub fn run<M: AsRef<[Observation]>>(
    config: EkfSlamConfig,
    motions: &[MotionRecord],
    measurements: &[M],
    num_steps: usize,
) -> Result<Vec<StepSnapshot>> {
    EkfSlam::new(config).run(motions, measurements, num_steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_prediction_only_step() {
        let mut slam = EkfSlam::new(EkfSlamConfig::default());
        let report = slam.step(&MotionRecord::new(1.0, 0.0, 0.0), &[]).unwrap();
        assert_eq!(report.snapshot.mean, vec![1.0, 0.0, 0.0]);
        assert_eq!(report.matched, 0);
        assert_eq!(report.landmarks_added, 0);
        assert_eq!(slam.steps_taken(), 1);
    }

    #[test]
    fn test_new_then_reobserved() {
        let mut slam = EkfSlam::new(EkfSlamConfig::default());
        let first = slam
            .step(&MotionRecord::new(0.0, 0.0, 0.0), &[Observation::new(5.0, 0.0)])
            .unwrap();
        assert_eq!(first.landmarks_added, 1);
        assert_eq!(first.snapshot.landmark_count(), 1);

        let second = slam
            .step(&MotionRecord::new(1.0, 0.0, 0.0), &[Observation::new(4.0, 0.0)])
            .unwrap();
        assert_eq!(second.matched, 1);
        assert_eq!(second.corrections, 1);
        assert_eq!(second.landmarks_added, 0);
        assert_eq!(second.snapshot.landmark_count(), 1);
        assert_relative_eq!(second.snapshot.landmarks().next().unwrap(), Vector2::new(5.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_new_landmark_is_skipped() {
        let mut slam = EkfSlam::new(EkfSlamConfig::default());
        let report = slam
            .step(
                &MotionRecord::new(0.0, 0.0, 0.0),
                &[Observation::new(0.0, 0.0), Observation::new(5.0, 0.0)],
            )
            .unwrap();
        assert_eq!(report.skipped_landmarks, 1);
        assert_eq!(report.landmarks_added, 1);
        assert_eq!(slam.state().dim(), 5);
    }

    #[test]
    fn test_degenerate_correction_skips_only_that_match() {
        let mut slam = EkfSlam::new(EkfSlamConfig::default());
        // Landmarks at (5, 0) and (0, 5)
        slam.step(
            &MotionRecord::new(0.0, 0.0, 0.0),
            &[Observation::new(5.0, 0.0), Observation::new(5.0, FRAC_PI_2)],
        )
        .unwrap();
        let second_before = slam.state().landmark(1).unwrap();

        // Drive onto the first landmark, then see both again. The second range
        // is 0.5 m long, so its correction moves the state.
        let second_range = 50.0f32.sqrt() + 0.5;
        let report = slam
            .step(
                &MotionRecord::new(5.0, 0.0, 0.0),
                &[Observation::new(0.0, 0.0), Observation::new(second_range, 3.0 * FRAC_PI_4)],
            )
            .unwrap();

        assert_eq!(report.matched, 2);
        assert_eq!(report.skipped_corrections, 1);
        assert_eq!(report.corrections, 1);
        assert_eq!(report.landmarks_added, 0);
        assert_eq!(slam.state().landmark_count(), 2);

        // The skipped landmark has no correlation with the rest and stays put.
        assert_eq!(slam.state().landmark(0).unwrap(), Vector2::new(5.0, 0.0));
        let second_after = slam.state().landmark(1).unwrap();
        assert!((second_after - second_before).norm() > 1e-4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut slam = EkfSlam::new(EkfSlamConfig::default());
        let motions = vec![MotionRecord::new(1.0, 0.0, 0.0); 3];
        let measurements: Vec<Vec<Observation>> = vec![Vec::new(); 2];
        let err = slam.run(&motions, &measurements, 3).unwrap_err();
        assert_eq!(
            err,
            SlamError::DimensionMismatch {
                steps: 3,
                motions: 3,
                measurements: 2
            }
        );
        assert!(!err.is_recoverable());
        assert_eq!(slam.steps_taken(), 0);
    }

    #[test]
    fn test_filter_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<EkfSlam>();
    }

    #[test]
    fn test_short_snapshot_does_not_panic() {
        let snapshot = StepSnapshot {
            step: 0,
            mean: vec![1.0],
        };
        assert_eq!(snapshot.pose(), None);
        assert_eq!(snapshot.landmark_count(), 0);
        assert_eq!(snapshot.landmarks().count(), 0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(StepPhase::Predicting.to_string(), "predicting");
        assert_eq!(StepPhase::Emitting.to_string(), "emitting");
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = StepSnapshot {
            step: 4,
            mean: vec![1.0, 2.0, 0.5, 3.0, 4.0, 5.0, 6.0],
        };
        assert_eq!(snapshot.pose(), Some(Vector3::new(1.0, 2.0, 0.5)));
        assert_eq!(snapshot.landmark_count(), 2);
        let landmarks: Vec<_> = snapshot.landmarks().collect();
        assert_eq!(landmarks, vec![Vector2::new(3.0, 4.0), Vector2::new(5.0, 6.0)]);
    }
}
