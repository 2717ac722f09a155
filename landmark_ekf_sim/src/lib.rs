#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod metrics;
pub mod noise;
pub mod recording;
pub mod report;
pub mod runner;
pub mod world;

pub mod prelude {
    pub use crate::config::RunConfig;
    pub use crate::metrics::{map_error, ErrorTracker, MapError, PoseErrorSummary};
    pub use crate::noise::gaussian_noise;
    pub use crate::recording::{GroundTruth, Recording};
    pub use crate::report::{write_step, ReportFormat, RunSummary};
    pub use crate::runner::run_recording;
    pub use crate::world::{simulate, SimulationConfig, World};
}
