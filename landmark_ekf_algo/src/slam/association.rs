//! Nearest-candidate data association.
//!
//! Each observation is projected into the world frame from the predicted
//! pose and compared against the stored landmarks in discovery order. The
//! first landmark within the squared-distance gate wins; it is not
//! necessarily the closest one.
//!
//! Association never mutates the state. Everything is decided against the
//! state as it was before any correction of the current step.

use nalgebra::{Vector2, Vector3};

use super::state::{SlamState, POSE_DIM};
use super::types::Observation;

/// How an observation was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Re-observation of the landmark stored at state index `index`
    Matched { index: usize },
    /// A landmark not seen before, expected to land at `provisional_index`
    New { provisional_index: usize },
}

/// An observation projected into the world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// World-frame landmark position implied by the observation
    pub position: Vector2<f32>,
    /// The raw observation it came from
    pub observation: Observation,
    pub kind: CandidateKind,
}

/// Result of associating one step's observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Associations {
    /// Re-observed landmarks, in observation order
    pub matched: Vec<Candidate>,
    /// New landmarks, in observation order
    pub new: Vec<Candidate>,
}

impl Associations {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.new.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matched.len() + self.new.len()
    }
}

/// World position of an observation taken from `pose`.
pub fn project(pose: &Vector3<f32>, obs: &Observation) -> Vector2<f32> {
    let angle = pose[2] + obs.bearing;
    Vector2::new(
        pose[0] + obs.range * angle.cos(),
        pose[1] + obs.range * angle.sin(),
    )
}

/// State index of the first stored landmark within `threshold` squared
/// distance of `position`.
pub fn find_match(state: &SlamState, position: &Vector2<f32>, threshold: f32) -> Option<usize> {
    state
        .landmarks()
        .position(|lm| (position - lm).norm_squared() <= threshold)
        .map(|i| POSE_DIM + 2 * i)
}

/// Classify every observation as a re-observation or a new landmark.
///
/// New landmarks get provisional indices `dim + k`, where `k` counts the new
/// landmarks already queued this step. The augmenter assigns the real index
/// when the landmark is appended.
pub fn associate(state: &SlamState, observations: &[Observation], threshold: f32) -> Associations {
    let pose = state.pose();
    let mut result = Associations::default();

    for obs in observations {
        let position = project(&pose, obs);
        match find_match(state, &position, threshold) {
            Some(index) => result.matched.push(Candidate {
                position,
                observation: *obs,
                kind: CandidateKind::Matched { index },
            }),
            None => {
                let provisional_index = state.dim() + result.new.len();
                result.new.push(Candidate {
                    position,
                    observation: *obs,
                    kind: CandidateKind::New { provisional_index },
                });
            }
        }
    }

    result
}
