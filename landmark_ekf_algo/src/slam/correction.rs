//! Kalman correction for re-observed landmarks.
//!
//! The measurement model predicts range and bearing from the robot to a
//! stored landmark. `H` only has non-zero entries in the three pose columns
//! and the two columns of the matched landmark, so `P Hᵀ` is assembled from
//! those five columns instead of a dense `2 x dim` product.
//!
//! With `dx = x_r - x_m`, `dy = y_r - y_m`, `q = dx² + dy²`, `r = √q`:
//!
//! ```text
//!        pose                      landmark
//! H = [  dx/r    dy/r    0   ...   -dx/r   -dy/r  ]
//!     [ -dy/q    dx/q   -1   ...    dy/q   -dx/q  ]
//! ```

use nalgebra::{Matrix2, Matrix2x3, MatrixXx2, Vector2, Vector3};

use super::association::Candidate;
use super::state::SlamState;
use crate::config::{CorrectionMode, EkfSlamConfig};
use crate::error::{Result, SlamError};
use crate::util::{inverse_2x2, normalize_angle, symmetrize2, symmetrize_in_place};

/// Jacobian of the range-bearing model, split into pose and landmark parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementJacobian {
    /// 2x3 block for [x, y, θ]
    pub pose: Matrix2x3<f32>,
    /// 2x2 block for [m_x, m_y]
    pub landmark: Matrix2<f32>,
    /// Range from robot to landmark
    pub range: f32,
}

/// Linearize the range-bearing model at `pose` for a landmark at `landmark`.
pub fn measurement_jacobian(pose: &Vector3<f32>, landmark: &Vector2<f32>) -> MeasurementJacobian {
    let dx = pose[0] - landmark[0];
    let dy = pose[1] - landmark[1];
    let q = dx * dx + dy * dy;
    let r = q.sqrt();

    MeasurementJacobian {
        pose: Matrix2x3::new(
            dx / r, dy / r, 0.0,
            -dy / q, dx / q, -1.0,
        ),
        landmark: Matrix2::new(
            -dx / r, -dy / r,
            dy / q, -dx / q,
        ),
        range: r,
    }
}

/// Range-dependent measurement noise `diag(r·c_r, c_b)`
pub fn measurement_noise(range: f32, config: &EkfSlamConfig) -> Matrix2<f32> {
    Matrix2::new(range * config.range_noise, 0.0, 0.0, config.bearing_noise)
}

/// Innovation used by [`CorrectionMode::Reference`]: stored landmark minus
/// candidate, both measured from the current pose.
///
/// Bearings are taken as world-frame angles of the two relative vectors, so
/// the robot heading cancels out of the difference.
pub fn reference_innovation(
    pose: &Vector3<f32>,
    landmark: &Vector2<f32>,
    candidate: &Vector2<f32>,
) -> Vector2<f32> {
    let stored = landmark - pose.xy();
    let observed = candidate - pose.xy();
    Vector2::new(
        stored.norm() - observed.norm(),
        normalize_angle(stored.y.atan2(stored.x) - observed.y.atan2(observed.x)),
    )
}

/// Observed minus predicted measurement, with the heading taken from the
/// current pose estimate.
pub fn standard_innovation(
    pose: &Vector3<f32>,
    landmark: &Vector2<f32>,
    candidate: &Candidate,
) -> Vector2<f32> {
    let rel = landmark - pose.xy();
    let predicted_bearing = rel.y.atan2(rel.x) - pose[2];
    Vector2::new(
        candidate.observation.range - rel.norm(),
        normalize_angle(candidate.observation.bearing - predicted_bearing),
    )
}

/// Correct the state with one re-observation of the landmark at state index
/// `index`.
///
/// Returns the innovation that was applied. On a recoverable error the state
/// is left exactly as it was.
pub fn correct(
    state: &mut SlamState,
    index: usize,
    candidate: &Candidate,
    config: &EkfSlamConfig,
) -> Result<Vector2<f32>> {
    state.check_landmark_index(index)?;
    let pose = state.pose();
    let landmark = state
        .landmark_at(index)
        .ok_or(SlamError::IndexOutOfRange { index, dim: state.dim() })?;

    let dist = (pose.xy() - landmark).norm();
    if !(dist > config.degenerate_range) {
        return Err(SlamError::DegenerateRange { index, range: dist });
    }
    let jac = measurement_jacobian(&pose, &landmark);

    let (gain, pht) = {
        let sigma = state.covariance();
        // P Hᵀ from the five columns H touches
        let pht: MatrixXx2<f32> = sigma.fixed_columns::<3>(0) * jac.pose.transpose()
            + sigma.fixed_columns::<2>(index) * jac.landmark.transpose();
        let s = jac.pose * pht.fixed_rows::<3>(0)
            + jac.landmark * pht.fixed_rows::<2>(index)
            + measurement_noise(jac.range, config);
        let s_inv = inverse_2x2(&symmetrize2(&s))
            .map_err(|determinant| SlamError::SingularInnovationCovariance { determinant })?;
        (&pht * s_inv, pht)
    };

    let innovation = match config.correction_mode {
        CorrectionMode::Reference => reference_innovation(&pose, &landmark, &candidate.position),
        CorrectionMode::Standard => standard_innovation(&pose, &landmark, candidate),
    };

    let update = &gain * innovation;
    let mut mean = state.mean_mut();
    mean += &update;

    if config.correction_mode == CorrectionMode::Standard {
        // P <- P - K (H P), with H P = (P Hᵀ)ᵀ
        let mut sigma = state.covariance_mut();
        sigma -= &gain * pht.transpose();
        symmetrize_in_place(state.covariance_mut());
    }

    Ok(innovation)
}
