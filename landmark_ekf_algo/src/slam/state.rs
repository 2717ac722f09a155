//! Mean and covariance of the landmark EKF over a growing state.
//!
//! ## State Vector Structure
//! - Dimension: 3 + 2n (robot pose + n landmarks)
//! - Robot pose: [x, y, θ]
//! - Landmarks: [m1_x, m1_y, m2_x, m2_y, ...] in discovery order
//!
//! Both the mean and the covariance live in buffers sized to a reserved
//! capacity; only the leading `dim` entries (or `dim x dim` block) are part of
//! the state. Capacity doubles when a new landmark does not fit, so appending
//! is amortized O(dim) per landmark.

use nalgebra::{
    DMatrix, DMatrixView, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Matrix2,
    Matrix3, Matrix3x2, Vector2, Vector3,
};

use super::StepPhase;
use crate::error::{Result, SlamError};

/// Dimension of the robot pose block.
pub const POSE_DIM: usize = 3;

/// Covariance blocks supplied when a landmark is appended.
///
/// Missing entries are zero-filled. `landmarks[k]` is the 2x2 block between
/// the new landmark (rows) and landmark `k` (columns); landmarks beyond
/// `landmarks.len()` get a zero block.
#[derive(Debug, Clone)]
pub struct LandmarkBlocks {
    /// Covariance of the new landmark itself
    pub own: Matrix2<f32>,
    /// Pose-to-landmark cross covariance (3x2)
    pub pose: Matrix3x2<f32>,
    /// Landmark-to-earlier-landmark cross covariances
    pub landmarks: Vec<Matrix2<f32>>,
}

/// EKF-SLAM state containing the mean and covariance of the state estimate
#[derive(Debug, Clone)]
pub struct SlamState {
    /// Mean buffer; entries `0..dim` are live
    mu: DVector<f32>,
    /// Covariance buffer; block `0..dim x 0..dim` is live
    sigma: DMatrix<f32>,
    /// Live dimension, always `3 + 2 * n_landmarks`
    dim: usize,
    /// Number of landmarks in the map
    n_landmarks: usize,
}

impl Default for SlamState {
    fn default() -> Self {
        Self::new()
    }
}

impl SlamState {
    /// Create a new state with the robot at the origin and zero covariance
    pub fn new() -> Self {
        Self::with_pose(0.0, 0.0, 0.0)
    }

    /// Create a new state at the given pose, known exactly
    pub fn with_pose(x: f32, y: f32, theta: f32) -> Self {
        Self::with_capacity(x, y, theta, 0)
    }

    /// Create a new state with room for `landmarks` landmarks before the
    /// buffers need to grow
    pub fn with_capacity(x: f32, y: f32, theta: f32, landmarks: usize) -> Self {
        let cap = POSE_DIM + 2 * landmarks;
        let mut mu = DVector::zeros(cap);
        mu[0] = x;
        mu[1] = y;
        mu[2] = theta;
        Self {
            mu,
            sigma: DMatrix::zeros(cap, cap),
            dim: POSE_DIM,
            n_landmarks: 0,
        }
    }

    /// Live state dimension (3 + 2n)
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of landmarks in the map
    pub fn landmark_count(&self) -> usize {
        self.n_landmarks
    }

    /// Number of landmarks the buffers hold before reallocating
    pub fn landmark_capacity(&self) -> usize {
        (self.sigma.nrows() - POSE_DIM) / 2
    }

    /// Get the robot pose [x, y, θ]
    pub fn pose(&self) -> Vector3<f32> {
        Vector3::new(self.mu[0], self.mu[1], self.mu[2])
    }

    /// Get robot x position
    pub fn x(&self) -> f32 {
        self.mu[0]
    }

    /// Get robot y position
    pub fn y(&self) -> f32 {
        self.mu[1]
    }

    /// Get robot heading angle
    pub fn theta(&self) -> f32 {
        self.mu[2]
    }

    /// Get landmark position by landmark number (0 = first discovered)
    pub fn landmark(&self, idx: usize) -> Option<Vector2<f32>> {
        if idx >= self.n_landmarks {
            return None;
        }
        self.landmark_at(POSE_DIM + 2 * idx)
    }

    /// Get landmark position by its offset in the state vector (3, 5, 7, ...)
    pub fn landmark_at(&self, index: usize) -> Option<Vector2<f32>> {
        if !self.is_landmark_index(index) {
            return None;
        }
        Some(Vector2::new(self.mu[index], self.mu[index + 1]))
    }

    /// Iterate over landmark positions in discovery order
    pub fn landmarks(&self) -> impl Iterator<Item = Vector2<f32>> + '_ {
        (0..self.n_landmarks).map(move |i| {
            let base = POSE_DIM + 2 * i;
            Vector2::new(self.mu[base], self.mu[base + 1])
        })
    }

    /// Whether `index` is the first offset of a live landmark
    pub fn is_landmark_index(&self, index: usize) -> bool {
        index >= POSE_DIM && (index - POSE_DIM) % 2 == 0 && index + 1 < self.dim
    }

    /// Get the 3x3 robot pose covariance
    pub fn robot_covariance(&self) -> Matrix3<f32> {
        self.sigma.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Get the 2x2 covariance block for a specific landmark
    pub fn landmark_covariance(&self, idx: usize) -> Option<Matrix2<f32>> {
        if idx >= self.n_landmarks {
            return None;
        }
        let base = POSE_DIM + 2 * idx;
        Some(self.sigma.fixed_view::<2, 2>(base, base).into_owned())
    }

    /// Live mean vector
    pub fn mean(&self) -> DVectorView<'_, f32> {
        self.mu.rows(0, self.dim)
    }

    /// Live covariance matrix
    pub fn covariance(&self) -> DMatrixView<'_, f32> {
        self.sigma.view((0, 0), (self.dim, self.dim))
    }

    pub(crate) fn mean_mut(&mut self) -> DVectorViewMut<'_, f32> {
        self.mu.rows_mut(0, self.dim)
    }

    pub(crate) fn covariance_mut(&mut self) -> DMatrixViewMut<'_, f32> {
        self.sigma.view_mut((0, 0), (self.dim, self.dim))
    }

    pub(crate) fn set_pose(&mut self, pose: &Vector3<f32>) {
        self.mu.fixed_rows_mut::<3>(0).copy_from(pose);
    }

    /// Append a landmark at `position` with the supplied covariance blocks.
    ///
    /// Returns the state index of the new landmark's x coordinate.
    pub fn append_landmark(&mut self, position: Vector2<f32>, blocks: &LandmarkBlocks) -> usize {
        let index = self.dim;
        self.reserve(1);

        self.mu[index] = position.x;
        self.mu[index + 1] = position.y;

        // The buffer beyond `dim` is never written, but rows/cols of a slot are
        // cleared anyway so the zero-fill contract does not depend on that.
        let cap = self.sigma.nrows();
        self.sigma.rows_mut(index, 2).fill(0.0);
        self.sigma.view_mut((0, index), (cap, 2)).fill(0.0);

        self.sigma
            .fixed_view_mut::<2, 2>(index, index)
            .copy_from(&blocks.own);
        self.sigma
            .fixed_view_mut::<3, 2>(0, index)
            .copy_from(&blocks.pose);
        self.sigma
            .fixed_view_mut::<2, 3>(index, 0)
            .copy_from(&blocks.pose.transpose());

        for (k, cross) in blocks.landmarks.iter().take(self.n_landmarks).enumerate() {
            let base = POSE_DIM + 2 * k;
            self.sigma
                .fixed_view_mut::<2, 2>(index, base)
                .copy_from(cross);
            self.sigma
                .fixed_view_mut::<2, 2>(base, index)
                .copy_from(&cross.transpose());
        }

        self.dim += 2;
        self.n_landmarks += 1;
        index
    }

    /// Make room for `additional` more landmarks without reallocating.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.dim + 2 * additional;
        let cap = self.sigma.nrows();
        if needed <= cap {
            return;
        }
        let new_cap = needed.max(POSE_DIM + 2 * (2 * self.landmark_capacity()).max(4));

        let mut mu = DVector::zeros(new_cap);
        mu.rows_mut(0, self.dim).copy_from(&self.mu.rows(0, self.dim));

        let mut sigma = DMatrix::zeros(new_cap, new_cap);
        sigma
            .view_mut((0, 0), (self.dim, self.dim))
            .copy_from(&self.sigma.view((0, 0), (self.dim, self.dim)));

        self.mu = mu;
        self.sigma = sigma;
    }

    /// Verify the dimension invariants.
    pub fn check_consistency(&self, phase: StepPhase) -> Result<()> {
        let consistent = self.dim == POSE_DIM + 2 * self.n_landmarks
            && self.mu.len() >= self.dim
            && self.sigma.nrows() == self.sigma.ncols()
            && self.sigma.nrows() == self.mu.len();
        if consistent {
            Ok(())
        } else {
            Err(SlamError::StateCorruption {
                phase,
                mean_len: self.dim,
                cov_rows: self.sigma.nrows(),
                cov_cols: self.sigma.ncols(),
                landmarks: self.n_landmarks,
            })
        }
    }

    /// Check that `index` addresses a live landmark.
    pub fn check_landmark_index(&self, index: usize) -> Result<()> {
        if self.is_landmark_index(index) {
            Ok(())
        } else {
            Err(SlamError::IndexOutOfRange {
                index,
                dim: self.dim,
            })
        }
    }
}
