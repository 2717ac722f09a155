//! Input records consumed by the filter.

use serde::{Deserialize, Serialize};

/// What the robot was commanded to do during a step. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionAction {
    #[default]
    Move,
    Turn,
    Stop,
}

/// Odometry for one time step, expressed in the robot frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionRecord {
    /// Timestamp (s)
    #[serde(default)]
    pub time: f32,
    #[serde(default)]
    pub action: MotionAction,
    /// Forward displacement (m)
    pub forward: f32,
    /// Sideways displacement (m)
    #[serde(default)]
    pub sideways: f32,
    /// Heading change (rad)
    pub dtheta: f32,
    /// Commanded speed (m/s)
    #[serde(default)]
    pub speed: f32,
}

impl MotionRecord {
    /// A record carrying only the displacement fields.
    pub fn new(forward: f32, sideways: f32, dtheta: f32) -> Self {
        Self {
            forward,
            sideways,
            dtheta,
            ..Default::default()
        }
    }
}

/// A single range-bearing observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Distance to landmark (meters)
    pub range: f32,
    /// Bearing angle to landmark relative to robot heading (radians)
    pub bearing: f32,
}

impl Observation {
    pub fn new(range: f32, bearing: f32) -> Self {
        Self { range, bearing }
    }
}
