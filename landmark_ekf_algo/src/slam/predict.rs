//! Odometry prediction step.
//!
//! The pose moves by the world-frame displacement
//!
//! ```text
//! dx = f·cos θ + s·sin θ
//! dy = f·sin θ + s·cos θ
//! ```
//!
//! computed from the heading *before* the step, and the heading advances by
//! `dθ`. Only the pose row/column blocks of the covariance change: landmarks
//! are static, so `P_mm` is never touched here.

use nalgebra::{Matrix2, Matrix2x3, Matrix3, Matrix3xX, Vector3};

use super::state::{SlamState, POSE_DIM};
use super::types::MotionRecord;
use crate::util::symmetrize3;

/// Jacobians of landmark initialization, linearized for the current step.
///
/// `jxr` maps pose uncertainty into a new landmark, `jz` maps measurement
/// noise. Both are reused for every landmark discovered during the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionJacobians {
    pub jxr: Matrix2x3<f32>,
    pub jz: Matrix2<f32>,
}

/// Everything the prediction produced that later stages of the step reuse.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// World-frame displacement [dx, dy, dθ]
    pub displacement: Vector3<f32>,
    /// Euclidean distance travelled this step
    pub distance: f32,
    /// Pose transition Jacobian
    pub a: Matrix3<f32>,
    /// Process noise
    pub q: Matrix3<f32>,
    pub jacobians: MotionJacobians,
    /// Pose covariance after prediction
    pub p_rr: Matrix3<f32>,
    /// Pose-landmark cross covariance after prediction (3 x 2n)
    pub p_ri: Matrix3xX<f32>,
}

/// World-frame displacement [dx, dy, dθ] of `motion` applied at heading `theta`.
pub fn displacement(theta: f32, motion: &MotionRecord) -> Vector3<f32> {
    let (s, c) = theta.sin_cos();
    Vector3::new(
        motion.forward * c + motion.sideways * s,
        motion.forward * s + motion.sideways * c,
        motion.dtheta,
    )
}

/// Motion model: pose after applying `motion` from `pose`
pub fn motion_model(pose: &Vector3<f32>, motion: &MotionRecord) -> Vector3<f32> {
    pose + displacement(pose[2], motion)
}

/// Linearized pose transition for a world displacement `d`
pub fn motion_jacobian(d: &Vector3<f32>) -> Matrix3<f32> {
    Matrix3::new(
        1.0, 0.0, -d[1],
        0.0, 1.0, d[0],
        0.0, 0.0, 1.0,
    )
}

/// Rank-1 process noise `c * d d^T`
pub fn process_noise(d: &Vector3<f32>, c: f32) -> Matrix3<f32> {
    d * d.transpose() * c
}

/// Landmark-initialization Jacobians for this step.
///
/// `heading` is the heading after the step and `distance` the distance
/// travelled during it.
pub fn initialization_jacobians(d: &Vector3<f32>, heading: f32, distance: f32) -> MotionJacobians {
    let (s, c) = heading.sin_cos();
    MotionJacobians {
        jxr: Matrix2x3::new(
            1.0, 0.0, -d[1],
            0.0, 1.0, d[0],
        ),
        jz: Matrix2::new(
            c, -distance * s,
            s, distance * c,
        ),
    }
}

/// Prediction step: move the pose and propagate its uncertainty.
///
/// `P_rr <- A P_rr A^T + Q` and `P_ri <- A P_ri` (mirrored into `P_ir`).
pub fn predict(state: &mut SlamState, motion: &MotionRecord, motion_noise: f32) -> Prediction {
    let pose = state.pose();
    let d = displacement(pose[2], motion);
    let new_pose = pose + d;
    state.set_pose(&new_pose);

    let distance = (d[0] * d[0] + d[1] * d[1]).sqrt();
    let a = motion_jacobian(&d);
    let q = process_noise(&d, motion_noise);

    let dim = state.dim();
    let n = dim - POSE_DIM;
    let mut sigma = state.covariance_mut();

    let p_rr_prev: Matrix3<f32> = sigma.fixed_view::<3, 3>(0, 0).into_owned();
    let p_rr = symmetrize3(&(a * p_rr_prev * a.transpose() + q));
    sigma.fixed_view_mut::<3, 3>(0, 0).copy_from(&p_rr);

    let p_ri: Matrix3xX<f32> = if n > 0 {
        let p_ri_prev: Matrix3xX<f32> = sigma.fixed_rows::<3>(0).columns(POSE_DIM, n).into_owned();
        let p_ri = a * p_ri_prev;
        sigma
            .fixed_rows_mut::<3>(0)
            .columns_mut(POSE_DIM, n)
            .copy_from(&p_ri);
        sigma
            .fixed_columns_mut::<3>(0)
            .rows_mut(POSE_DIM, n)
            .copy_from(&p_ri.transpose());
        p_ri
    } else {
        Matrix3xX::zeros(0)
    };

    Prediction {
        displacement: d,
        distance,
        a,
        q,
        jacobians: initialization_jacobians(&d, new_pose[2], distance),
        p_rr,
        p_ri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slam::state::LandmarkBlocks;
    use crate::util::max_asymmetry;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3x2, Vector2};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_straight_motion() {
        let mut state = SlamState::new();
        let prediction = predict(&mut state, &MotionRecord::new(1.0, 0.0, 0.0), 0.1);

        assert_relative_eq!(state.pose(), Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(prediction.distance, 1.0);
        assert_relative_eq!(prediction.a[(0, 2)], 0.0);
        assert_relative_eq!(prediction.a[(1, 2)], 1.0);
        // Q = 0.1 * (1,0,0)(1,0,0)^T
        assert_relative_eq!(state.robot_covariance()[(0, 0)], 0.1);
        assert_relative_eq!(state.robot_covariance()[(1, 1)], 0.0);
    }

    #[test]
    fn test_displacement_uses_pre_update_heading() {
        let mut state = SlamState::with_pose(0.0, 0.0, FRAC_PI_2);
        predict(&mut state, &MotionRecord::new(2.0, 0.0, 1.0), 0.0);
        assert_relative_eq!(state.x(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(state.y(), 2.0, epsilon = 1e-6);
        assert_relative_eq!(state.theta(), FRAC_PI_2 + 1.0);
    }

    #[test]
    fn test_sideways_term() {
        let d = displacement(0.0, &MotionRecord::new(0.0, 1.0, 0.0));
        // At θ = 0 the sideways term contributes sin θ to dx and cos θ to dy.
        assert_relative_eq!(d, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_process_noise_is_rank_one() {
        let d = Vector3::new(1.0, 2.0, 0.5);
        let q = process_noise(&d, 0.2);
        assert_relative_eq!(q[(0, 1)], 0.4);
        assert_relative_eq!(q[(2, 2)], 0.05);
        assert_relative_eq!(q.determinant(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(q, q.transpose());
    }

    #[test]
    fn test_covariance_propagation() {
        let mut state = SlamState::new();
        state.append_landmark(
            Vector2::new(5.0, 0.0),
            &LandmarkBlocks {
                own: Matrix2::new(2.0, 0.5, 0.5, 1.0),
                pose: Matrix3x2::new(0.1, 0.2, 0.3, 0.4, 0.5, 0.6),
                landmarks: vec![],
            },
        );
        {
            let mut sigma = state.covariance_mut();
            sigma[(0, 0)] = 0.2;
            sigma[(1, 1)] = 0.3;
            sigma[(2, 2)] = 0.1;
        }
        let p_mm_before = state.landmark_covariance(0).unwrap();
        let p_rr_before = state.robot_covariance();
        let p_ri_before: Matrix3x2<f32> = state.covariance().fixed_view::<3, 2>(0, 3).into_owned();

        let motion = MotionRecord::new(1.0, 0.0, 0.2);
        let prediction = predict(&mut state, &motion, 0.05);

        let a = prediction.a;
        let expected_rr = a * p_rr_before * a.transpose() + prediction.q;
        assert_relative_eq!(state.robot_covariance(), expected_rr, epsilon = 1e-6);

        let expected_ri = a * p_ri_before;
        let p_ri: Matrix3x2<f32> = state.covariance().fixed_view::<3, 2>(0, 3).into_owned();
        assert_relative_eq!(p_ri, expected_ri, epsilon = 1e-6);
        assert_relative_eq!(prediction.p_ri.fixed_columns::<2>(0).into_owned(), expected_ri, epsilon = 1e-6);

        // Landmark block is untouched, bit for bit.
        assert_eq!(state.landmark_covariance(0).unwrap(), p_mm_before);
        assert_relative_eq!(max_asymmetry(&state.covariance()), 0.0);
    }

    #[test]
    fn test_initialization_jacobians() {
        let d = Vector3::new(0.5, 0.25, 0.0);
        let j = initialization_jacobians(&d, 0.0, 2.0);
        assert_relative_eq!(j.jxr[(0, 2)], -0.25);
        assert_relative_eq!(j.jxr[(1, 2)], 0.5);
        assert_relative_eq!(j.jz, Matrix2::new(1.0, 0.0, 0.0, 2.0));
    }
}
