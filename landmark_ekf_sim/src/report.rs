//! Per-step state dumps and the end-of-run summary.

use std::fmt;
use std::io::{self, Write};

use landmark_ekf_algo::config::CorrectionMode;
use landmark_ekf_algo::slam::{StepReport, StepSnapshot};
use nalgebra::Vector3;
use serde::Serialize;

use crate::metrics::{MapError, PoseErrorSummary};

/// How per-step output is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// "X after time-step k" followed by one state value per line
    #[default]
    Text,
    /// One JSON object per step
    JsonLines,
    /// Nothing per step
    Quiet,
}

/// Write the mean state after a step as a text block.
pub fn write_state<W: Write>(out: &mut W, snapshot: &StepSnapshot) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "X after time-step {}", snapshot.step)?;
    for value in &snapshot.mean {
        writeln!(out, "{value}")?;
    }
    writeln!(out)
}

/// Write one step in the chosen format.
pub fn write_step<W: Write>(out: &mut W, report: &StepReport, format: ReportFormat) -> io::Result<()> {
    match format {
        ReportFormat::Text => write_state(out, &report.snapshot),
        ReportFormat::JsonLines => {
            serde_json::to_writer(&mut *out, report)?;
            writeln!(out)
        }
        ReportFormat::Quiet => Ok(()),
    }
}

/// Totals over a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub steps: usize,
    pub mode: CorrectionMode,
    pub landmarks: usize,
    pub corrections: usize,
    pub skipped_corrections: usize,
    pub skipped_landmarks: usize,
    /// Final pose estimate [x, y, θ]
    pub final_pose: Vector3<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose_error: Option<PoseErrorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_error: Option<MapError>,
}

impl RunSummary {
    pub fn new(mode: CorrectionMode, initial_pose: Vector3<f32>) -> Self {
        Self {
            steps: 0,
            mode,
            landmarks: 0,
            corrections: 0,
            skipped_corrections: 0,
            skipped_landmarks: 0,
            final_pose: initial_pose,
            pose_error: None,
            map_error: None,
        }
    }

    /// Fold one step into the totals.
    pub fn record(&mut self, report: &StepReport) {
        self.steps += 1;
        self.landmarks = report.snapshot.landmark_count();
        self.corrections += report.corrections;
        self.skipped_corrections += report.skipped_corrections;
        self.skipped_landmarks += report.skipped_landmarks;
        if let Some(pose) = report.snapshot.pose() {
            self.final_pose = pose;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "steps: {} ({:?} correction)", self.steps, self.mode)?;
        writeln!(f, "landmarks: {}", self.landmarks)?;
        writeln!(
            f,
            "corrections: {} applied, {} skipped; {} new landmarks skipped",
            self.corrections, self.skipped_corrections, self.skipped_landmarks
        )?;
        write!(
            f,
            "final pose: ({:.3}, {:.3}, {:.3})",
            self.final_pose[0], self.final_pose[1], self.final_pose[2]
        )?;
        if let Some(err) = &self.pose_error {
            write!(
                f,
                "\npose error: final {:.3} m, mean {:.3} m, max {:.3} m (dead reckoning {:.3} m)",
                err.final_error, err.mean_error, err.max_error, err.final_dead_reckoning_error
            )?;
        }
        if let Some(err) = &self.map_error {
            write!(
                f,
                "\nmap error: mean {:.3} m, max {:.3} m over {} landmarks",
                err.mean, err.max, err.landmarks
            )?;
        }
        Ok(())
    }
}
