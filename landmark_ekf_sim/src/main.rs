use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use landmark_ekf_algo::config::CorrectionMode;
use landmark_ekf_sim::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Mean-only correction
    Reference,
    /// Full EKF correction with covariance contraction
    Standard,
}

impl From<Mode> for CorrectionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Reference => CorrectionMode::Reference,
            Mode::Standard => CorrectionMode::Standard,
        }
    }
}

/// Landmark EKF-SLAM over a synthetic world or a recorded run
#[derive(Parser, Debug)]
#[command(name = "landmark-ekf", version, about)]
struct Args {
    /// TOML file with [filter] and [simulation] sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of steps to simulate (or to replay from --input)
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Number of landmarks in the synthetic world
    #[arg(short, long)]
    landmarks: Option<usize>,

    /// RNG seed for the synthetic world
    #[arg(short, long)]
    seed: Option<u64>,

    /// Simulate exact odometry and observations
    #[arg(long)]
    noise_free: bool,

    /// Correction mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Replay streams from a JSON recording instead of simulating
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Save the streams that were run to a JSON recording
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Emit one JSON object per step
    #[arg(long)]
    json: bool,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(steps) = self.steps {
            config.simulation.steps = steps;
        }
        if let Some(landmarks) = self.landmarks {
            config.simulation.landmarks = landmarks;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if self.noise_free {
            config.simulation.noise_free = true;
        }
        if let Some(mode) = self.mode {
            config.filter.correction_mode = mode.into();
        }
        Ok(config)
    }

    fn format(&self) -> ReportFormat {
        if self.quiet {
            ReportFormat::Quiet
        } else if self.json {
            ReportFormat::JsonLines
        } else {
            ReportFormat::Text
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.run_config()?;

    let recording = match &args.input {
        Some(path) => {
            let mut recording = Recording::load(path)?;
            if let Some(steps) = args.steps {
                recording.truncate(steps);
            }
            info!(path = %path.display(), steps = recording.steps(), "loaded recording");
            recording
        }
        None => {
            info!(
                steps = config.simulation.steps,
                landmarks = config.simulation.landmarks,
                seed = config.simulation.seed,
                "simulating world"
            );
            simulate(config.simulation.clone())
        }
    };

    if let Some(path) = &args.record {
        recording.save(path)?;
        info!(path = %path.display(), "saved recording");
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = run_recording(&config.filter, &recording, &mut out, args.format())?;

    if args.json {
        serde_json::to_writer(&mut out, &summary)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{summary}")?;
    }
    out.flush()?;
    Ok(())
}
