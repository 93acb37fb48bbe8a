//! Ingestion handler: the trigger entry point and the only error boundary.
//!
//! Per invocation:
//! `Start → Fetching → {EmptyResult → 404, HasData → Shaping → Writing → 200}`,
//! and any failure along the way ends in 500. Nothing is retried and no state
//! survives between invocations.

use crate::data::{FetchError, QuoteProvider};
use crate::domain::{Interval, Period, TickerSet};
use crate::partition::{PartitionWriter, StoredObject, WriteError};
use crate::shape::{self, ShapeError, ShapingStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const NO_DATA_BODY: &str = "No data found";
pub const ERROR_BODY: &str = "Error processing request";

/// Source of the capture time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Trigger payload. `tickers` may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
}

impl IngestRequest {
    pub fn with_tickers<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tickers: Some(tickers.into_iter().map(Into::into).collect()),
        }
    }
}

/// Trigger result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl IngestResponse {
    pub fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    pub fn no_data() -> Self {
        Self {
            status_code: 404,
            body: NO_DATA_BODY.into(),
        }
    }

    pub fn internal_error() -> Self {
        Self {
            status_code: 500,
            body: ERROR_BODY.into(),
        }
    }
}

/// Anything that can fail below the handler.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("shaping failed: {0}")]
    Shape(#[from] ShapeError),

    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

/// Terminal, non-error outcomes of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    NoData { tickers: TickerSet },
    Landed(StoredObject),
}

/// Wires fetcher → shaper → writer.
pub struct IngestionHandler<'a> {
    provider: &'a dyn QuoteProvider,
    writer: PartitionWriter<'a>,
    clock: &'a dyn Clock,
    period: Period,
    interval: Interval,
    default_tickers: TickerSet,
    shaping: ShapingStrategy,
}

impl<'a> IngestionHandler<'a> {
    pub fn new(
        provider: &'a dyn QuoteProvider,
        writer: PartitionWriter<'a>,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            provider,
            writer,
            clock,
            period: Period::OneDay,
            interval: Interval::OneMinute,
            default_tickers: TickerSet::single("AAPL"),
            shaping: ShapingStrategy::Stacked,
        }
    }

    pub fn with_range(mut self, period: Period, interval: Interval) -> Self {
        self.period = period;
        self.interval = interval;
        self
    }

    pub fn with_default_tickers(mut self, tickers: TickerSet) -> Self {
        self.default_tickers = tickers;
        self
    }

    pub fn with_shaping(mut self, shaping: ShapingStrategy) -> Self {
        self.shaping = shaping;
        self
    }

    /// Run one invocation and convert every outcome into a response.
    pub fn handle(&self, request: IngestRequest) -> IngestResponse {
        match self.run(request) {
            Ok(IngestOutcome::Landed(stored)) => IngestResponse::ok(stored.body_text()),
            Ok(IngestOutcome::NoData { .. }) => IngestResponse::no_data(),
            Err(e) => {
                error!(error = %e, causes = %cause_chain(&e), "Error fetching data");
                IngestResponse::internal_error()
            }
        }
    }

    /// Run one invocation, surfacing failures to the caller.
    pub fn run(&self, request: IngestRequest) -> Result<IngestOutcome, IngestError> {
        let tickers = request
            .tickers
            .map(TickerSet::from)
            .unwrap_or_else(|| self.default_tickers.clone());
        info!(tickers = ?tickers.as_slice(), "Processing tickers");

        let table = self
            .provider
            .fetch_latest(&tickers, self.period, self.interval)?;
        debug!(
            fetched = ?table.tickers().collect::<Vec<_>>(),
            rows = table.len(),
            "Fetched latest quotes"
        );

        if table.is_empty() {
            warn!(tickers = ?tickers.as_slice(), "No data found for tickers");
            return Ok(IngestOutcome::NoData { tickers });
        }

        let captured_at = self.clock.now();
        let batch = shape::shape(self.shaping, &table, &tickers, captured_at, self.interval)?;
        let stored = self.writer.write(&batch, captured_at)?;

        info!(
            uri = %stored.uri,
            records = batch.len(),
            bytes = stored.size(),
            hash = %stored.content_hash,
            "Successfully landed data"
        );
        Ok(IngestOutcome::Landed(stored))
    }
}

/// Render an error and all of its sources, outermost first.
fn cause_chain(err: &dyn StdError) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
