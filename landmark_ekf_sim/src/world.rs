//! Synthetic landmark world.
//!
//! A robot starts at the centre of a square world (the origin) and drives a
//! fixed distance per step, wandering slightly in heading. When the next move
//! would leave the world it stops and turns back toward the centre instead.
//! After every step it observes every landmark within sensor range.

use landmark_ekf_algo::slam::{motion_model, MotionAction, MotionRecord, Observation};
use landmark_ekf_algo::util::normalize_angle;
use nalgebra::{Vector2, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::noise::gaussian_noise;
use crate::recording::{GroundTruth, Recording};

/// Landmarks are kept at least this far from the start position
const START_CLEARANCE: f32 = 3.0;

/// Synthetic world parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of steps to simulate
    pub steps: usize,
    /// Number of landmarks to place
    pub landmarks: usize,
    /// Side length of the square world (m)
    pub world_size: f32,
    /// Sensor range (m)
    pub measurement_range: f32,
    /// Odometry noise coefficient, relative to the commanded motion
    pub motion_noise: f32,
    /// Range noise variance per meter and bearing noise variance (rad^2)
    pub measurement_noise: f32,
    /// Distance driven per step (m)
    pub step_distance: f32,
    /// Standard deviation of the commanded heading change (rad)
    pub turn_std: f32,
    /// Minimum distance between two landmarks (m)
    pub min_landmark_spacing: f32,
    pub seed: u64,
    /// Produce exact odometry and observations
    pub noise_free: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 5,
            landmarks: 2,
            world_size: 75.0,
            measurement_range: 25.0,
            motion_noise: 0.1,
            measurement_noise: 0.1,
            step_distance: 5.0,
            turn_std: 0.2,
            min_landmark_spacing: 5.0,
            seed: 0,
            noise_free: false,
        }
    }
}

/// Seeded generator of motion and measurement streams.
pub struct World {
    config: SimulationConfig,
    landmarks: Vec<Vector2<f32>>,
    rng: StdRng,
}

impl World {
    /// Place landmarks for `config`. The same seed always yields the same world.
    pub fn new(config: SimulationConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let landmarks = generate_landmarks(&mut rng, &config);
        if landmarks.len() < config.landmarks {
            debug!(
                placed = landmarks.len(),
                requested = config.landmarks,
                "world too crowded for the requested landmark spacing"
            );
        }
        Self { config, landmarks, rng }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn landmarks(&self) -> &[Vector2<f32>] {
        &self.landmarks
    }

    /// Drive the robot for the configured number of steps.
    pub fn simulate(mut self) -> Recording {
        let steps = self.config.steps;
        let mut pose = Vector3::zeros();
        let mut motions = Vec::with_capacity(steps);
        let mut measurements = Vec::with_capacity(steps);
        let mut poses = Vec::with_capacity(steps);

        for k in 0..steps {
            let command = self.command(&pose, k);
            pose = motion_model(&pose, &command);
            measurements.push(self.observe(&pose));
            motions.push(self.odometry(&command));
            poses.push(pose);
        }

        Recording {
            motions,
            measurements,
            truth: Some(GroundTruth {
                poses,
                landmarks: self.landmarks,
            }),
        }
    }

    /// Commanded motion for step `k` from the true `pose`.
    fn command(&mut self, pose: &Vector3<f32>, k: usize) -> MotionRecord {
        let half = self.config.world_size / 2.0;
        let distance = self.config.step_distance;
        let next = pose.xy() + distance * Vector2::new(pose[2].cos(), pose[2].sin());

        let mut record = if next.x.abs() > half || next.y.abs() > half {
            let home = (-pose.y).atan2(-pose.x);
            MotionRecord {
                action: MotionAction::Turn,
                ..MotionRecord::new(0.0, 0.0, normalize_angle(home - pose[2]))
            }
        } else {
            let turn = gaussian_noise(&mut self.rng, self.config.turn_std);
            MotionRecord::new(distance, 0.0, turn)
        };
        record.time = k as f32;
        record.speed = record.forward;
        record
    }

    /// Odometry reported for a commanded motion.
    fn odometry(&mut self, command: &MotionRecord) -> MotionRecord {
        if self.config.noise_free {
            return *command;
        }
        let c = self.config.motion_noise;
        MotionRecord {
            forward: command.forward + gaussian_noise(&mut self.rng, c * command.forward.abs()),
            dtheta: command.dtheta + gaussian_noise(&mut self.rng, c * command.dtheta.abs()),
            ..*command
        }
    }

    /// Range-bearing observations of every landmark in sensor range.
    fn observe(&mut self, pose: &Vector3<f32>) -> Vec<Observation> {
        let mut observations = Vec::new();
        for lm in &self.landmarks {
            let delta = lm - pose.xy();
            let range = delta.norm();
            if range > self.config.measurement_range {
                continue;
            }
            let bearing = normalize_angle(delta.y.atan2(delta.x) - pose[2]);
            let obs = if self.config.noise_free {
                Observation::new(range, bearing)
            } else {
                // Variances match the filter's measurement model: r*c and c.
                let c = self.config.measurement_noise;
                let range_noise = gaussian_noise(&mut self.rng, (range * c).sqrt());
                let bearing_noise = gaussian_noise(&mut self.rng, c.sqrt());
                Observation::new(
                    (range + range_noise).max(0.0),
                    normalize_angle(bearing + bearing_noise),
                )
            };
            observations.push(obs);
        }
        observations
    }
}

/// Place landmarks uniformly in the world by rejection sampling.
///
/// Gives up after `100 * n` attempts, so a crowded world may hold fewer
/// landmarks than requested.
pub fn generate_landmarks<R: Rng + ?Sized>(rng: &mut R, config: &SimulationConfig) -> Vec<Vector2<f32>> {
    let n = config.landmarks;
    let half = config.world_size / 2.0;
    let mut landmarks: Vec<Vector2<f32>> = Vec::with_capacity(n);
    let mut attempts = 0;
    let max_attempts = n * 100;

    while landmarks.len() < n && attempts < max_attempts {
        attempts += 1;

        let candidate = Vector2::new(
            (rng.gen::<f32>() - 0.5) * 2.0 * half,
            (rng.gen::<f32>() - 0.5) * 2.0 * half,
        );
        if candidate.norm() < START_CLEARANCE {
            continue;
        }

        let too_close = landmarks
            .iter()
            .any(|lm| (lm - candidate).norm() < config.min_landmark_spacing);
        if !too_close {
            landmarks.push(candidate);
        }
    }

    landmarks
}

/// Generate a recording for `config`.
pub fn simulate(config: SimulationConfig) -> Recording {
    World::new(config).simulate()
}
