//! Transformation schedule: a data-driven job definition plus a generic
//! sequential runner.
//!
//! The schedule is configuration, not code. The default definition runs the
//! silver-layer model build followed by the gold layer on market hours.

pub mod cron;
pub mod pipeline;
pub mod runner;

pub use cron::{CronError, CronExpr};
pub use pipeline::{CommandSpec, DbtSettings, PipelineSchedule, StepSpec};
pub use runner::{RunReport, ShellStepRunner, StepFailure, StepReport, StepRunner};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read schedule {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schedule: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error("schedule has no steps")]
    NoSteps,

    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle among steps: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("step '{step}' failed after {attempts} attempt(s): {source}")]
    StepFailed {
        step: String,
        attempts: u32,
        /// Steps that finished before the failure.
        completed: Vec<String>,
        #[source]
        source: StepFailure,
    },
}
