//! Quotelake CLI — ingestion trigger and transformation schedule commands.
//!
//! Commands:
//! - `invoke` — run the ingestion handler on a JSON trigger event
//! - `sample` — fetch latest quotes and print one per-ticker record
//! - `schedule show` — print the transformation schedule and upcoming runs
//! - `schedule due` — check whether the schedule fires at a given minute
//! - `schedule run` — execute the transformation steps in order

mod telemetry;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use quotelake_core::data::{QuoteProvider, StaticProvider, YahooProvider};
use quotelake_core::domain::TickerSet;
use quotelake_core::schedule::{
    DbtSettings, PipelineSchedule, ShellStepRunner, StepFailure, StepRunner, StepSpec,
};
use quotelake_core::shape::{self, RecordBatch, ShapingStrategy};
use quotelake_core::storage::{MemoryObjectStore, ObjectStore};
use quotelake_core::{
    Clock, FixedClock, IngestConfig, IngestRequest, IngestionHandler, PartitionWriter,
    SystemClock,
};
use std::path::{Path, PathBuf};
use telemetry::LogFormat;

#[derive(Parser)]
#[command(
    name = "quotelake",
    about = "Quotelake CLI — stock quote ingestion and transformation schedule"
)]
struct Cli {
    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion handler once and print its response.
    Invoke {
        /// Trigger event as inline JSON, e.g. '{"tickers":["AAPL"]}'.
        #[arg(long)]
        event: Option<String>,

        /// Read the trigger event from a JSON file.
        #[arg(long)]
        event_file: Option<PathBuf>,

        /// Tickers (comma-separated). Overrides the event's tickers.
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,

        /// Ingestion config TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Serve quotes from a JSON file of rows instead of Yahoo Finance.
        #[arg(long)]
        quotes_file: Option<PathBuf>,

        /// Capture time (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,

        /// Write to an in-memory store instead of the configured backend.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Fetch the latest quotes and print one per-ticker sample record.
    Sample {
        /// Tickers (comma-separated). Defaults to the configured list.
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,

        /// Ingestion config TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Serve quotes from a JSON file of rows instead of Yahoo Finance.
        #[arg(long)]
        quotes_file: Option<PathBuf>,
    },
    /// Transformation schedule commands.
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Print the schedule, its step order, and the next runs.
    Show {
        #[command(flatten)]
        source: ScheduleSource,

        /// How many upcoming runs to list.
        #[arg(long, default_value_t = 5)]
        upcoming: usize,
    },
    /// Report whether the schedule fires at the given minute.
    Due {
        #[command(flatten)]
        source: ScheduleSource,

        /// Time to check (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Execute the steps in order, retrying as configured.
    Run {
        #[command(flatten)]
        source: ScheduleSource,

        /// Print the commands without executing them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct ScheduleSource {
    /// Schedule definition TOML. Defaults to the dbt silver → gold job.
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// dbt executable for the default job.
    #[arg(long, default_value = "dbt")]
    dbt: PathBuf,

    /// dbt project directory for the default job.
    #[arg(long, default_value = "yfinance_dbt")]
    project_dir: PathBuf,

    /// dbt profiles directory for the default job.
    #[arg(long, default_value = "yfinance_dbt")]
    profiles_dir: PathBuf,
}

impl ScheduleSource {
    fn load(&self) -> Result<PipelineSchedule> {
        if let Some(path) = &self.schedule {
            return PipelineSchedule::from_file(path)
                .with_context(|| format!("loading schedule {}", path.display()));
        }
        Ok(PipelineSchedule::dbt_transformation(&DbtSettings {
            executable: self.dbt.clone(),
            project_dir: self.project_dir.clone(),
            profiles_dir: self.profiles_dir.clone(),
        })?)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    match cli.command {
        Commands::Invoke {
            event,
            event_file,
            tickers,
            config,
            quotes_file,
            at,
            dry_run,
        } => run_invoke(
            event,
            event_file,
            tickers,
            config.as_deref(),
            quotes_file.as_deref(),
            at.as_deref(),
            dry_run,
        ),
        Commands::Sample {
            tickers,
            config,
            quotes_file,
        } => run_sample(tickers, config.as_deref(), quotes_file.as_deref()),
        Commands::Schedule { action } => match action {
            ScheduleAction::Show { source, upcoming } => run_schedule_show(&source, upcoming),
            ScheduleAction::Due { source, at } => run_schedule_due(&source, at.as_deref()),
            ScheduleAction::Run { source, dry_run } => run_schedule(&source, dry_run),
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    let mut config = match path {
        Some(path) => IngestConfig::from_file(path)?,
        None => IngestConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn build_provider(
    config: &IngestConfig,
    quotes_file: Option<&Path>,
) -> Result<Box<dyn QuoteProvider>> {
    let provider: Box<dyn QuoteProvider> = match quotes_file {
        Some(path) => Box::new(StaticProvider::from_file(path)?),
        None => Box::new(YahooProvider::new(&config.provider)?),
    };
    Ok(provider)
}

fn parse_at(at: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    at.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("invalid --at '{s}', expected RFC 3339"))
    })
    .transpose()
}

#[allow(clippy::too_many_arguments)]
fn run_invoke(
    event: Option<String>,
    event_file: Option<PathBuf>,
    tickers: Vec<String>,
    config_path: Option<&Path>,
    quotes_file: Option<&Path>,
    at: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    if event.is_some() && event_file.is_some() {
        bail!("--event and --event-file are mutually exclusive");
    }

    let mut request: IngestRequest = match (event, event_file) {
        (Some(json), _) => serde_json::from_str(&json).context("parsing --event")?,
        (None, Some(path)) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        (None, None) => IngestRequest::default(),
    };
    if !tickers.is_empty() {
        request.tickers = Some(tickers);
    }

    let config = load_config(config_path)?;
    let provider = build_provider(&config, quotes_file)?;
    let store: Box<dyn ObjectStore> = if dry_run {
        Box::new(MemoryObjectStore::new(&config.storage.bucket))
    } else {
        config.build_store()?
    };
    let clock: Box<dyn Clock> = match parse_at(at)? {
        Some(fixed) => Box::new(FixedClock(fixed)),
        None => Box::new(SystemClock),
    };

    let writer = PartitionWriter::with_prefix(store.as_ref(), config.storage.prefix.clone());
    let handler = IngestionHandler::new(provider.as_ref(), writer, clock.as_ref())
        .with_range(config.provider.period, config.provider.interval)
        .with_default_tickers(TickerSet::from(config.handler.default_tickers.clone()))
        .with_shaping(config.handler.shaping);

    let response = handler.handle(request);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.status_code >= 500 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_sample(
    tickers: Vec<String>,
    config_path: Option<&Path>,
    quotes_file: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let provider = build_provider(&config, quotes_file)?;

    let tickers = if tickers.is_empty() {
        TickerSet::from(config.handler.default_tickers.clone())
    } else {
        TickerSet::from(tickers)
    };

    let table = provider.fetch_latest(&tickers, config.provider.period, config.provider.interval)?;
    if table.is_empty() {
        bail!("no data found for {}", tickers.as_slice().join(", "));
    }

    let batch = shape::shape(
        ShapingStrategy::PerTicker,
        &table,
        &tickers,
        Utc::now(),
        config.provider.interval,
    )?;

    println!("Fetched {} record(s)", batch.len());
    if let RecordBatch::Constructed(records) = &batch {
        if let Some(first) = records.first() {
            println!("Sample record:");
            println!("{}", serde_json::to_string_pretty(first)?);
        }
    }
    Ok(())
}

/// How far ahead `schedule show` looks for upcoming runs.
const UPCOMING_HORIZON_DAYS: i64 = 31;

fn run_schedule_show(source: &ScheduleSource, upcoming: usize) -> Result<()> {
    let schedule = source.load()?;
    let order = schedule.execution_order()?;

    println!("Schedule:  {}", schedule.name);
    if !schedule.description.is_empty() {
        println!("About:     {}", schedule.description);
    }
    println!("Cron:      {} (UTC)", schedule.cron);
    println!("Catchup:   {}", schedule.catchup);
    if !schedule.tags.is_empty() {
        println!("Tags:      {}", schedule.tags.join(", "));
    }
    println!();
    println!("{:<4} {:<20} {:<8} {:<8} Command", "#", "Step", "Retries", "Delay");
    println!("{}", "-".repeat(72));
    for (i, step) in order.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:<8} {:<8} {}",
            i + 1,
            step.name,
            step.retries,
            format!("{}s", step.retry_delay_secs),
            step.render_command()
        );
    }

    if upcoming > 0 {
        println!();
        println!("Next runs:");
        let now = Utc::now().naive_utc();
        let horizon = now + chrono::Duration::days(UPCOMING_HORIZON_DAYS);
        for next in schedule.cron.occurrences(now, horizon).into_iter().take(upcoming) {
            println!("  {}", next.format("%Y-%m-%d %H:%M UTC (%a)"));
        }
    }
    Ok(())
}

fn run_schedule_due(source: &ScheduleSource, at: Option<&str>) -> Result<()> {
    let schedule = source.load()?;
    let at: NaiveDateTime = parse_at(at)?.unwrap_or_else(Utc::now).naive_utc();

    let due = schedule.cron.matches(at);
    println!(
        "{} at {}: {}",
        schedule.name,
        at.format("%Y-%m-%d %H:%M UTC"),
        if due { "due" } else { "not due" }
    );
    if let Some(next) = schedule.cron.next_after(at) {
        println!("Next run: {}", next.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

/// Prints each step's command instead of running it.
struct EchoStepRunner;

impl StepRunner for EchoStepRunner {
    fn run_step(&self, step: &StepSpec) -> Result<(), StepFailure> {
        println!("[dry run] {}: {}", step.name, step.render_command());
        Ok(())
    }
}

fn run_schedule(source: &ScheduleSource, dry_run: bool) -> Result<()> {
    let schedule = source.load()?;
    let runner: &dyn StepRunner = if dry_run {
        &EchoStepRunner
    } else {
        &ShellStepRunner
    };

    let report = schedule.run(runner, &mut std::thread::sleep)?;

    println!();
    println!("=== Run Complete: {} ===", schedule.name);
    for step in &report.steps {
        println!("{:<20} {} attempt(s)", step.name, step.attempts);
    }
    Ok(())
}
