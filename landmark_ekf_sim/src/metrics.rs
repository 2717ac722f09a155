//! Estimation accuracy against ground truth.

use std::collections::VecDeque;

use nalgebra::Vector2;
use serde::Serialize;

/// Default number of per-step errors kept
pub const DEFAULT_HISTORY_LEN: usize = 1000;

/// Tracks pose errors of the filter and of plain dead reckoning.
#[derive(Debug, Clone)]
pub struct ErrorTracker {
    /// History of estimation errors
    est_errors: VecDeque<f32>,
    /// History of dead reckoning errors
    dr_errors: VecDeque<f32>,
    max_len: usize,
    /// Running statistics over every tracked step, not just the window
    steps: usize,
    est_sum: f32,
    est_max: f32,
}

impl ErrorTracker {
    pub fn new(max_len: usize) -> Self {
        Self {
            est_errors: VecDeque::with_capacity(max_len),
            dr_errors: VecDeque::with_capacity(max_len),
            max_len,
            steps: 0,
            est_sum: 0.0,
            est_max: 0.0,
        }
    }

    pub fn with_default_len() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }

    /// Track errors for this step.
    pub fn track(&mut self, est_err: f32, dr_err: f32) {
        self.est_errors.push_back(est_err);
        self.dr_errors.push_back(dr_err);
        self.steps += 1;
        self.est_sum += est_err;
        self.est_max = self.est_max.max(est_err);

        if self.est_errors.len() > self.max_len {
            self.est_errors.pop_front();
            self.dr_errors.pop_front();
        }
    }

    /// Track errors from positions.
    pub fn track_positions(&mut self, truth: &Vector2<f32>, est: &Vector2<f32>, dr: &Vector2<f32>) {
        self.track((truth - est).norm(), (truth - dr).norm());
    }

    pub fn est_errors(&self) -> impl Iterator<Item = &f32> {
        self.est_errors.iter()
    }

    pub fn dr_errors(&self) -> impl Iterator<Item = &f32> {
        self.dr_errors.iter()
    }

    pub fn current_est_error(&self) -> Option<f32> {
        self.est_errors.back().copied()
    }

    pub fn current_dr_error(&self) -> Option<f32> {
        self.dr_errors.back().copied()
    }

    /// Mean estimation error over every tracked step
    pub fn mean_est_error(&self) -> Option<f32> {
        (self.steps > 0).then(|| self.est_sum / self.steps as f32)
    }

    /// Largest estimation error over every tracked step
    pub fn max_est_error(&self) -> Option<f32> {
        (self.steps > 0).then_some(self.est_max)
    }

    /// Number of errors currently held
    pub fn len(&self) -> usize {
        self.est_errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.est_errors.is_empty()
    }

    pub fn summary(&self) -> Option<PoseErrorSummary> {
        Some(PoseErrorSummary {
            final_error: self.current_est_error()?,
            mean_error: self.mean_est_error()?,
            max_error: self.max_est_error()?,
            final_dead_reckoning_error: self.current_dr_error()?,
        })
    }
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::with_default_len()
    }
}

/// Pose accuracy over a run (m)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseErrorSummary {
    pub final_error: f32,
    pub mean_error: f32,
    pub max_error: f32,
    pub final_dead_reckoning_error: f32,
}

/// Map accuracy: distance from each estimated landmark to the nearest true one (m)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapError {
    pub landmarks: usize,
    pub mean: f32,
    pub max: f32,
}

/// Compare an estimated map with the true landmarks.
///
/// Returns `None` when either map is empty.
pub fn map_error<I>(estimated: I, truth: &[Vector2<f32>]) -> Option<MapError>
where
    I: IntoIterator<Item = Vector2<f32>>,
{
    if truth.is_empty() {
        return None;
    }
    let mut count = 0;
    let mut sum = 0.0;
    let mut max = 0.0f32;
    for est in estimated {
        let nearest = truth
            .iter()
            .map(|lm| (lm - est).norm())
            .fold(f32::INFINITY, f32::min);
        count += 1;
        sum += nearest;
        max = max.max(nearest);
    }
    (count > 0).then(|| MapError {
        landmarks: count,
        mean: sum / count as f32,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_error_tracking() {
        let mut tracker = ErrorTracker::new(5);

        tracker.track(1.0, 2.0);
        tracker.track(1.5, 2.5);
        tracker.track(2.0, 3.0);

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.current_est_error(), Some(2.0));
        assert_eq!(tracker.current_dr_error(), Some(3.0));
        assert_relative_eq!(tracker.mean_est_error().unwrap(), 1.5);
        assert_eq!(tracker.max_est_error(), Some(2.0));
    }

    #[test]
    fn test_track_positions() {
        let mut tracker = ErrorTracker::new(5);
        tracker.track_positions(&Vector2::zeros(), &Vector2::new(3.0, 4.0), &Vector2::new(0.0, 5.0));

        assert_relative_eq!(tracker.current_est_error().unwrap(), 5.0, epsilon = 1e-6);
        assert_relative_eq!(tracker.current_dr_error().unwrap(), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bounded_history_keeps_running_stats() {
        let mut tracker = ErrorTracker::new(3);
        for i in 1..=5 {
            tracker.track(i as f32, i as f32 * 2.0);
        }

        assert_eq!(tracker.len(), 3);
        let est_errors: Vec<_> = tracker.est_errors().copied().collect();
        assert_eq!(est_errors, vec![3.0, 4.0, 5.0]);
        assert_relative_eq!(tracker.mean_est_error().unwrap(), 3.0);
        assert_eq!(tracker.max_est_error(), Some(5.0));
    }

    #[test]
    fn test_empty_tracker_has_no_summary() {
        assert!(ErrorTracker::default().summary().is_none());
    }

    #[test]
    fn test_map_error() {
        let truth = [Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)];
        let estimated = vec![Vector2::new(0.0, 1.0), Vector2::new(10.0, 0.5)];
        let error = map_error(estimated, &truth).unwrap();
        assert_eq!(error.landmarks, 2);
        assert_relative_eq!(error.mean, 0.75);
        assert_relative_eq!(error.max, 1.0);
    }

    #[test]
    fn test_map_error_empty() {
        assert!(map_error(Vec::new(), &[Vector2::new(1.0, 1.0)]).is_none());
        assert!(map_error(vec![Vector2::new(1.0, 1.0)], &[]).is_none());
    }
}
