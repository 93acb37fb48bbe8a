//! Quote provider trait and structured fetch errors.
//!
//! The QuoteProvider trait abstracts over market-data sources so the handler
//! can run against Yahoo Finance in production and a static table in tests
//! or offline runs.

use crate::domain::{Interval, Period, QuoteRow, QuoteTable, TickerSet};
use std::path::Path;
use thiserror::Error;

/// Provenance tag written into every constructed record.
pub const YAHOO_SOURCE: &str = "yahoo_finance";

/// Provider or transport failure during retrieval.
///
/// An empty result is not an error; it comes back as an empty `QuoteTable`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("fixture error: {0}")]
    Fixture(String),
}

/// A market-data source returning OHLCV bars for a set of tickers.
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch every bar the provider has for the tickers over `period`.
    ///
    /// Tickers the provider does not know are left out of the table.
    fn fetch(
        &self,
        tickers: &TickerSet,
        period: Period,
        interval: Interval,
    ) -> Result<QuoteTable, FetchError>;

    /// Fetch and keep only the most recent bar per ticker.
    fn fetch_latest(
        &self,
        tickers: &TickerSet,
        period: Period,
        interval: Interval,
    ) -> Result<QuoteTable, FetchError> {
        Ok(self.fetch(tickers, period, interval)?.tail())
    }
}

/// Provider backed by a fixed set of rows.
///
/// Serves offline invocations (`--quotes-file`) and tests. Only rows whose
/// symbol was requested are returned, mirroring a real provider.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    rows: Vec<QuoteRow>,
}

impl StaticProvider {
    pub fn new(rows: Vec<QuoteRow>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load rows from a JSON array of `QuoteRow`.
    pub fn from_file(path: &Path) -> Result<Self, FetchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Fixture(format!("read {}: {e}", path.display())))?;
        let rows: Vec<QuoteRow> = serde_json::from_str(&content)
            .map_err(|e| FetchError::Fixture(format!("parse {}: {e}", path.display())))?;
        Ok(Self::new(rows))
    }
}

impl QuoteProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(
        &self,
        tickers: &TickerSet,
        _period: Period,
        _interval: Interval,
    ) -> Result<QuoteTable, FetchError> {
        Ok(QuoteTable::from_rows(
            self.rows
                .iter()
                .filter(|row| tickers.iter().any(|t| t == row.symbol))
                .cloned(),
        ))
    }
}
