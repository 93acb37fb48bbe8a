//! Transformation schedule: file loading, window checks, and sequential runs.

use chrono::NaiveDate;
use quotelake_core::schedule::{
    DbtSettings, PipelineSchedule, ScheduleError, StepFailure, StepRunner, StepSpec,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Records commands and fails the named step every time.
struct RecordingRunner {
    fail: Option<&'static str>,
    commands: RefCell<Vec<String>>,
}

impl RecordingRunner {
    fn new(fail: Option<&'static str>) -> Self {
        Self {
            fail,
            commands: RefCell::new(Vec::new()),
        }
    }
}

impl StepRunner for RecordingRunner {
    fn run_step(&self, step: &StepSpec) -> Result<(), StepFailure> {
        self.commands.borrow_mut().push(step.render_command());
        if self.fail == Some(step.name.as_str()) {
            return Err(StepFailure::new("exited with status 1"));
        }
        Ok(())
    }
}

#[test]
fn file_definition_equals_builtin_default() {
    let from_file = PipelineSchedule::from_file(&fixture("dbt_schedule.toml")).unwrap();
    let builtin = PipelineSchedule::dbt_transformation(&DbtSettings::default()).unwrap();
    assert_eq!(from_file, builtin);
}

#[test]
fn window_covers_weekday_market_hours() {
    let schedule = PipelineSchedule::from_file(&fixture("dbt_schedule.toml")).unwrap();
    let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

    let fired: Vec<u32> = (0..24)
        .filter(|h| schedule.cron.matches(monday.and_hms_opt(*h, 0, 0).unwrap()))
        .collect();
    assert_eq!(fired, (14..=21).collect::<Vec<_>>());

    let sunday = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();
    assert!(!schedule.cron.matches(sunday.and_hms_opt(15, 0, 0).unwrap()));
}

#[test]
fn run_invokes_silver_then_gold_commands() {
    let schedule = PipelineSchedule::from_file(&fixture("dbt_schedule.toml")).unwrap();
    let runner = RecordingRunner::new(None);

    let report = schedule.run(&runner, &mut |_| {}).unwrap();

    assert_eq!(report.steps.len(), 2);
    let commands = runner.commands.borrow();
    assert_eq!(
        commands[0],
        "dbt run --select silver_layer --project-dir yfinance_dbt --profiles-dir yfinance_dbt"
    );
    assert_eq!(
        commands[1],
        "dbt run --select gold_layer --project-dir yfinance_dbt --profiles-dir yfinance_dbt"
    );
}

#[test]
fn failed_silver_blocks_gold_after_one_retry() {
    let schedule = PipelineSchedule::from_file(&fixture("dbt_schedule.toml")).unwrap();
    let runner = RecordingRunner::new(Some("dbt_run_silver"));
    let mut slept = Vec::new();

    let err = schedule.run(&runner, &mut |d| slept.push(d)).unwrap_err();

    assert!(matches!(
        err,
        ScheduleError::StepFailed { ref step, attempts: 2, .. } if step == "dbt_run_silver"
    ));
    assert_eq!(slept, [Duration::from_secs(300)]);
    assert!(runner
        .commands
        .borrow()
        .iter()
        .all(|c| c.contains("silver_layer")));
}

#[test]
fn missing_schedule_file_is_read_error() {
    let err = PipelineSchedule::from_file(&fixture("does_not_exist.toml")).unwrap_err();
    assert!(matches!(err, ScheduleError::Read { .. }));
}
