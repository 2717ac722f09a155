//! Small numeric helpers shared by the filter stages.

use nalgebra::{DMatrixViewMut, Matrix2, Matrix3};
use std::f32::consts::{PI, TAU};

/// Determinants below this magnitude are treated as singular.
pub const SINGULAR_EPSILON: f32 = 1e-12;

/// Normalize angle to [-π, π]
///
/// Angles already in range are returned unchanged. Anything else is wrapped
/// in constant time, however many turns it has accumulated.
pub fn normalize_angle(angle: f32) -> f32 {
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    (angle + PI).rem_euclid(TAU) - PI
}

/// Closed-form inverse of a 2x2 matrix.
///
/// Fails with the offending determinant when the matrix is singular or the
/// determinant is not finite.
pub fn inverse_2x2(m: &Matrix2<f32>) -> Result<Matrix2<f32>, f32> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return Err(det);
    }
    let inv_det = 1.0 / det;
    Ok(Matrix2::new(
        m[(1, 1)] * inv_det,
        -m[(0, 1)] * inv_det,
        -m[(1, 0)] * inv_det,
        m[(0, 0)] * inv_det,
    ))
}

/// Average a 3x3 block with its transpose.
pub fn symmetrize3(m: &Matrix3<f32>) -> Matrix3<f32> {
    (m + m.transpose()) * 0.5
}

/// Average a 2x2 block with its transpose.
pub fn symmetrize2(m: &Matrix2<f32>) -> Matrix2<f32> {
    (m + m.transpose()) * 0.5
}

/// Force exact symmetry on a square view by averaging mirrored entries.
pub fn symmetrize_in_place(mut m: DMatrixViewMut<'_, f32>) {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = avg;
            m[(j, i)] = avg;
        }
    }
}

/// Largest absolute difference between mirrored entries.
pub fn max_asymmetry(m: &nalgebra::DMatrixView<'_, f32>) -> f32 {
    let n = m.nrows();
    let mut worst = 0.0f32;
    for i in 0..n {
        for j in (i + 1)..n {
            worst = worst.max((m[(i, j)] - m[(j, i)]).abs());
        }
    }
    worst
}
