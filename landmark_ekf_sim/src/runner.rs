//! Drives the filter over a recording and scores it.

use std::io::Write;

use anyhow::{Context, Result};
use landmark_ekf_algo::config::EkfSlamConfig;
use landmark_ekf_algo::slam::{motion_model, EkfSlam};
use nalgebra::Vector3;

use crate::metrics::{map_error, ErrorTracker};
use crate::recording::Recording;
use crate::report::{write_step, ReportFormat, RunSummary};

/// Run a fresh filter over `recording`, writing per-step output to `out`.
///
/// When the recording carries ground truth, the pose error of the filter and
/// of dead reckoning over the same odometry is tracked, and the final map is
/// scored against the true landmarks.
pub fn run_recording<W: Write>(
    config: &EkfSlamConfig,
    recording: &Recording,
    out: &mut W,
    format: ReportFormat,
) -> Result<RunSummary> {
    recording.validate()?;

    let mut slam = EkfSlam::new(config.clone());
    let initial = slam.state().pose();
    let mut summary = RunSummary::new(config.correction_mode, initial);
    let mut tracker = ErrorTracker::with_default_len();
    let mut dead_reckoning: Vector3<f32> = initial;
    let mut io_result = Ok(());

    slam.run_with(
        &recording.motions,
        &recording.measurements,
        recording.steps(),
        |report| {
            summary.record(report);
            if let Some(truth) = &recording.truth {
                let k = report.snapshot.step;
                dead_reckoning = motion_model(&dead_reckoning, &recording.motions[k]);
                if let Some(pose) = report.snapshot.pose() {
                    tracker.track_positions(&truth.poses[k].xy(), &pose.xy(), &dead_reckoning.xy());
                }
            }
            if io_result.is_ok() {
                io_result = write_step(&mut *out, report, format);
            }
        },
    )?;
    io_result.context("failed to write step output")?;

    if let Some(truth) = &recording.truth {
        summary.pose_error = tracker.summary();
        summary.map_error = map_error(slam.state().landmarks(), &truth.landmarks);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{simulate, SimulationConfig};

    #[test]
    fn test_text_output_per_step() {
        let recording = simulate(SimulationConfig {
            steps: 3,
            seed: 5,
            ..SimulationConfig::default()
        });
        let mut out = Vec::new();
        let summary = run_recording(&EkfSlamConfig::default(), &recording, &mut out, ReportFormat::Text).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(summary.steps, 3);
        assert_eq!(text.matches("X after time-step").count(), 3);
        assert!(text.contains("X after time-step 0\n"));
        assert!(summary.pose_error.is_some());
    }

    #[test]
    fn test_recording_without_truth() {
        let mut recording = simulate(SimulationConfig::default());
        recording.truth = None;
        let mut out = Vec::new();
        let summary = run_recording(&EkfSlamConfig::default(), &recording, &mut out, ReportFormat::Quiet).unwrap();
        assert!(out.is_empty());
        assert!(summary.pose_error.is_none());
        assert!(summary.map_error.is_none());
    }
}
