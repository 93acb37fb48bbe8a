//! Pipeline schedule definition.
//!
//! ```toml
//! name = "yfinance_dbt_transformation"
//! description = "Run dbt transformations on Yahoo Finance stock data"
//! cron = "0 14-21 * * 1-5"
//! tags = ["yfinance", "dbt", "production"]
//!
//! [[steps]]
//! name = "dbt_run_silver"
//! command = { program = "dbt", args = ["run", "--select", "silver_layer"] }
//!
//! [[steps]]
//! name = "dbt_run_gold"
//! command = { program = "dbt", args = ["run", "--select", "gold_layer"] }
//! depends_on = ["dbt_run_silver"]
//! ```

use super::cron::CronExpr;
use super::ScheduleError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SCHEDULE_NAME: &str = "yfinance_dbt_transformation";
pub const DEFAULT_CRON: &str = "0 14-21 * * 1-5";
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Shell-quoted rendering for display.
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|token| shell_quote(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub command: CommandSpec,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Extra attempts after the first failure.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl StepSpec {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            depends_on: Vec::new(),
            retries: DEFAULT_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }

    pub fn after(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn render_command(&self) -> String {
        self.command.render()
    }
}

/// Where the dbt executable and project live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbtSettings {
    pub executable: PathBuf,
    pub project_dir: PathBuf,
    pub profiles_dir: PathBuf,
}

impl Default for DbtSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("dbt"),
            project_dir: PathBuf::from("yfinance_dbt"),
            profiles_dir: PathBuf::from("yfinance_dbt"),
        }
    }
}

impl DbtSettings {
    fn run_layer(&self, layer: &str) -> CommandSpec {
        CommandSpec::new(
            self.executable.display().to_string(),
            [
                "run".to_string(),
                "--select".to_string(),
                layer.to_string(),
                "--project-dir".to_string(),
                self.project_dir.display().to_string(),
                "--profiles-dir".to_string(),
                self.profiles_dir.display().to_string(),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSchedule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cron: CronExpr,
    /// Whether missed windows are backfilled.
    #[serde(default)]
    pub catchup: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<StepSpec>,
}

impl PipelineSchedule {
    /// The silver → gold model build, hourly on weekday market hours (UTC).
    pub fn dbt_transformation(settings: &DbtSettings) -> Result<Self, ScheduleError> {
        let silver = StepSpec::new("dbt_run_silver", settings.run_layer("silver_layer"));
        let gold = StepSpec::new("dbt_run_gold", settings.run_layer("gold_layer"))
            .after("dbt_run_silver");

        Ok(Self {
            name: DEFAULT_SCHEDULE_NAME.into(),
            description: "Run dbt transformations on Yahoo Finance stock data".into(),
            cron: CronExpr::parse(DEFAULT_CRON)?,
            catchup: false,
            tags: vec!["yfinance".into(), "dbt".into(), "production".into()],
            steps: vec![silver, gold],
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ScheduleError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScheduleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ScheduleError> {
        let schedule: Self = toml::from_str(content)?;
        schedule.execution_order()?;
        Ok(schedule)
    }

    /// Steps in dependency order. Ties keep declaration order.
    pub fn execution_order(&self) -> Result<Vec<&StepSpec>, ScheduleError> {
        if self.steps.is_empty() {
            return Err(ScheduleError::NoSteps);
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(ScheduleError::DuplicateStep(step.name.clone()));
            }
        }
        for step in &self.steps {
            if let Some(dep) = step.depends_on.iter().find(|d| !names.contains(d.as_str())) {
                return Err(ScheduleError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let mut done: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.steps.len());
        while order.len() < self.steps.len() {
            let ready = self.steps.iter().find(|s| {
                !done.contains(s.name.as_str())
                    && s.depends_on.iter().all(|d| done.contains(d.as_str()))
            });
            match ready {
                Some(step) => {
                    done.insert(step.name.as_str());
                    order.push(step);
                }
                None => {
                    let stuck = self
                        .steps
                        .iter()
                        .filter(|s| !done.contains(s.name.as_str()))
                        .map(|s| s.name.clone())
                        .collect();
                    return Err(ScheduleError::Cycle(stuck));
                }
            }
        }
        Ok(order)
    }
}

fn shell_quote(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("\"{}\"", token.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
