//! State augmentation for newly discovered landmarks.
//!
//! A new landmark inherits the pose uncertainty through `Jxr` and picks up
//! fresh measurement noise through `Jz`:
//!
//! ```text
//! P_nn = Jxr P_rr Jxrᵀ + Jz R Jzᵀ
//! P_rn = P_rr Jxrᵀ
//! P_nk = Jxr P_rk          for earlier landmarks k
//! ```

use nalgebra::{Matrix2, Matrix3, Matrix3x2};
use tracing::trace;

use super::association::{Candidate, CandidateKind};
use super::correction::measurement_noise;
use super::predict::Prediction;
use super::state::{LandmarkBlocks, SlamState, POSE_DIM};
use crate::config::{CorrectionMode, EkfSlamConfig};
use crate::error::{Result, SlamError};
use crate::util::symmetrize2;

/// Covariance blocks for a new landmark observed at `range` from the robot.
///
/// In reference mode the pose blocks come from `prediction`, and only the
/// landmarks that existed before the step get cross terms. In standard mode
/// the current covariance is used and every stored landmark is correlated,
/// including ones added earlier in the same step.
pub fn landmark_blocks(
    state: &SlamState,
    range: f32,
    prediction: &Prediction,
    config: &EkfSlamConfig,
) -> LandmarkBlocks {
    let jxr = prediction.jacobians.jxr;
    let jz = prediction.jacobians.jz;
    let noise = measurement_noise(range, config);

    let (p_rr, landmarks): (Matrix3<f32>, Vec<Matrix2<f32>>) = match config.correction_mode {
        CorrectionMode::Reference => {
            let prior = prediction.p_ri.ncols() / 2;
            let cross = (0..prior)
                .map(|k| jxr * prediction.p_ri.fixed_columns::<2>(2 * k))
                .collect();
            (prediction.p_rr, cross)
        }
        CorrectionMode::Standard => {
            let sigma = state.covariance();
            let cross = (0..state.landmark_count())
                .map(|k| jxr * sigma.fixed_view::<3, 2>(0, POSE_DIM + 2 * k))
                .collect();
            (state.robot_covariance(), cross)
        }
    };

    let own = jxr * p_rr * jxr.transpose() + jz * noise * jz.transpose();
    let pose: Matrix3x2<f32> = p_rr * jxr.transpose();

    LandmarkBlocks {
        own: symmetrize2(&own),
        pose,
        landmarks,
    }
}

/// Append the landmark described by `candidate` to the state.
///
/// Returns the state index it was stored at.
pub fn augment(
    state: &mut SlamState,
    candidate: &Candidate,
    prediction: &Prediction,
    config: &EkfSlamConfig,
) -> Result<usize> {
    let range = (state.pose().xy() - candidate.position).norm();
    if !(range > config.degenerate_range) {
        return Err(SlamError::DegenerateRange {
            index: state.dim(),
            range,
        });
    }

    let blocks = landmark_blocks(state, range, prediction, config);
    let index = state.append_landmark(candidate.position, &blocks);

    if let CandidateKind::New { provisional_index } = candidate.kind {
        if provisional_index != index {
            trace!(provisional_index, index, "landmark stored away from its provisional slot");
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slam::association::project;
    use crate::slam::predict::predict;
    use crate::slam::types::{MotionRecord, Observation};
    use crate::util::max_asymmetry;
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};

    fn new_candidate(pose: &Vector3<f32>, range: f32, bearing: f32, slot: usize) -> Candidate {
        let observation = Observation::new(range, bearing);
        Candidate {
            position: project(pose, &observation),
            observation,
            kind: CandidateKind::New {
                provisional_index: slot,
            },
        }
    }

    #[test]
    fn test_first_landmark() {
        let config = EkfSlamConfig::default();
        let mut state = SlamState::new();
        let prediction = predict(&mut state, &MotionRecord::new(1.0, 0.0, 0.0), config.motion_noise);
        let cand = new_candidate(&state.pose(), 5.0, 0.0, 3);

        let index = augment(&mut state, &cand, &prediction, &config).unwrap();
        assert_eq!(index, 3);
        assert_eq!(state.dim(), 5);
        assert_relative_eq!(state.landmark(0).unwrap(), Vector2::new(6.0, 0.0), epsilon = 1e-6);

        let jxr = prediction.jacobians.jxr;
        let jz = prediction.jacobians.jz;
        let noise = Matrix2::new(5.0 * config.range_noise, 0.0, 0.0, config.bearing_noise);
        let expected = jxr * prediction.p_rr * jxr.transpose() + jz * noise * jz.transpose();
        assert_relative_eq!(state.landmark_covariance(0).unwrap(), expected, epsilon = 1e-6);

        let p = state.covariance();
        let expected_pose: Matrix3x2<f32> = prediction.p_rr * jxr.transpose();
        assert_relative_eq!(p.fixed_view::<3, 2>(0, 3).into_owned(), expected_pose, epsilon = 1e-6);
        assert_relative_eq!(max_asymmetry(&p), 0.0);
    }

    #[test]
    fn test_cross_terms_with_prior_landmarks() {
        let config = EkfSlamConfig::default();
        let mut state = SlamState::new();
        let prediction = predict(&mut state, &MotionRecord::new(1.0, 0.0, 0.1), config.motion_noise);
        let first = new_candidate(&state.pose(), 5.0, 0.0, 3);
        augment(&mut state, &first, &prediction, &config).unwrap();

        // Second step: the first landmark now has pose correlation.
        let prediction = predict(&mut state, &MotionRecord::new(1.0, 0.0, 0.1), config.motion_noise);
        let pose = state.pose();
        augment(&mut state, &new_candidate(&pose, 4.0, 1.0, 5), &prediction, &config).unwrap();
        augment(&mut state, &new_candidate(&pose, 6.0, -1.0, 6), &prediction, &config).unwrap();
        assert_eq!(state.landmark_count(), 3);

        let jxr = prediction.jacobians.jxr;
        let expected: Matrix2<f32> = jxr * prediction.p_ri.fixed_columns::<2>(0);
        let p = state.covariance();
        assert_relative_eq!(p.fixed_view::<2, 2>(5, 3).into_owned(), expected, epsilon = 1e-6);
        assert_relative_eq!(p.fixed_view::<2, 2>(7, 3).into_owned(), expected, epsilon = 1e-6);
        assert_relative_eq!(p.fixed_view::<2, 2>(3, 5).into_owned(), expected.transpose(), epsilon = 1e-6);

        // Landmarks discovered in the same step stay uncorrelated.
        assert_eq!(p.fixed_view::<2, 2>(7, 5).into_owned(), Matrix2::zeros());
        assert_eq!(p.fixed_view::<2, 2>(5, 7).into_owned(), Matrix2::zeros());
        assert_relative_eq!(max_asymmetry(&p), 0.0);
    }

    #[test]
    fn test_standard_mode_correlates_same_step_landmarks() {
        let config = EkfSlamConfig::default().with_mode(CorrectionMode::Standard);
        let mut state = SlamState::new();
        let prediction = predict(&mut state, &MotionRecord::new(1.0, 0.0, 0.1), config.motion_noise);
        let pose = state.pose();
        augment(&mut state, &new_candidate(&pose, 4.0, 1.0, 3), &prediction, &config).unwrap();
        augment(&mut state, &new_candidate(&pose, 6.0, -1.0, 4), &prediction, &config).unwrap();

        let jxr = prediction.jacobians.jxr;
        let expected = jxr * prediction.p_rr * jxr.transpose();
        let p = state.covariance();
        assert_relative_eq!(p.fixed_view::<2, 2>(5, 3).into_owned(), expected, epsilon = 1e-6);
        assert_relative_eq!(max_asymmetry(&p), 0.0);
    }

    #[test]
    fn test_degenerate_range_is_skipped() {
        let config = EkfSlamConfig::default();
        let mut state = SlamState::new();
        let prediction = predict(&mut state, &MotionRecord::new(0.0, 0.0, 0.0), config.motion_noise);
        let cand = new_candidate(&state.pose(), 0.0, 0.0, 3);
        let err = augment(&mut state, &cand, &prediction, &config).unwrap_err();
        assert!(matches!(err, SlamError::DegenerateRange { index: 3, .. }));
        assert_eq!(state.dim(), 3);
    }
}
