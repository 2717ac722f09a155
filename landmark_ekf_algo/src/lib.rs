#![allow(non_snake_case)]

pub mod config;
pub mod error;
pub mod slam;
pub mod util;
pub mod prelude {
    pub use crate::config::{CorrectionMode, EkfSlamConfig};
    pub use crate::error::{ConfigError, SlamError};
    pub use crate::slam::{
        EkfSlam, MotionAction, MotionRecord, Observation, SlamState, StepPhase, StepReport,
        StepSnapshot,
    };
    pub use crate::util::normalize_angle;
    pub use nalgebra;
    pub use nalgebra::{matrix, vector};
}

pub use prelude::*;
