//! Sequential step execution with per-step retries.

use super::pipeline::{PipelineSchedule, StepSpec};
use super::ScheduleError;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// One failed attempt of a step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepFailure {
    pub message: String,
}

impl StepFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes a single step attempt.
pub trait StepRunner {
    fn run_step(&self, step: &StepSpec) -> Result<(), StepFailure>;
}

/// Runs the step's command as a child process, inheriting stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellStepRunner;

impl StepRunner for ShellStepRunner {
    fn run_step(&self, step: &StepSpec) -> Result<(), StepFailure> {
        let status = Command::new(&step.command.program)
            .args(&step.command.args)
            .status()
            .map_err(|e| {
                StepFailure::new(format!("failed to start '{}': {e}", step.command.program))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(StepFailure::new(match status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn total_attempts(&self) -> u32 {
        self.steps.iter().map(|s| s.attempts).sum()
    }
}

impl PipelineSchedule {
    /// Run every step in dependency order. The first step to exhaust its
    /// retries stops the run; nothing after it executes.
    pub fn run(
        &self,
        runner: &dyn StepRunner,
        sleep: &mut dyn FnMut(Duration),
    ) -> Result<RunReport, ScheduleError> {
        let order = self.execution_order()?;
        let mut report = RunReport::default();
        info!(schedule = %self.name, steps = order.len(), "Starting run");

        for step in order {
            let max_attempts = step.max_attempts();
            let mut attempt = 1;
            loop {
                info!(step = %step.name, attempt, command = %step.render_command(), "Running step");
                match runner.run_step(step) {
                    Ok(()) => {
                        report.steps.push(StepReport {
                            name: step.name.clone(),
                            attempts: attempt,
                        });
                        break;
                    }
                    Err(failure) if attempt < max_attempts => {
                        warn!(
                            step = %step.name,
                            attempt,
                            error = %failure,
                            delay_secs = step.retry_delay_secs,
                            "Step failed, retrying"
                        );
                        sleep(step.retry_delay());
                        attempt += 1;
                    }
                    Err(failure) => {
                        error!(step = %step.name, attempts = attempt, error = %failure, "Step failed");
                        return Err(ScheduleError::StepFailed {
                            step: step.name.clone(),
                            attempts: attempt,
                            completed: report.steps.into_iter().map(|s| s.name).collect(),
                            source: failure,
                        });
                    }
                }
            }
        }

        info!(schedule = %self.name, attempts = report.total_attempts(), "Run complete");
        Ok(report)
    }
}
