//! Quote rows and the table the fetcher hands to the shaper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered ticker symbols requested in one invocation.
///
/// Duplicates are tolerated: they cost an extra provider lookup but change
/// nothing downstream, because the table is keyed by ticker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSet(Vec<String>);

impl TickerSet {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(symbols.into_iter().map(Into::into).collect())
    }

    pub fn single(symbol: impl Into<String>) -> Self {
        Self(vec![symbol.into()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for TickerSet {
    fn from(symbols: Vec<String>) -> Self {
        Self(symbols)
    }
}

/// One OHLCV observation for one ticker at one bar timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Fetch result: rows keyed by (ticker, timestamp).
///
/// Tickers iterate in sorted order; each ticker's rows are sorted by
/// timestamp ascending. An empty table is the provider's "no data" answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteTable {
    series: BTreeMap<String, BTreeMap<DateTime<Utc>, QuoteRow>>,
}

impl QuoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = QuoteRow>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.insert(row);
        }
        table
    }

    /// Insert a row, replacing any row already held for the same key.
    pub fn insert(&mut self, row: QuoteRow) {
        self.series
            .entry(row.symbol.clone())
            .or_default()
            .insert(row.timestamp, row);
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(BTreeMap::is_empty)
    }

    /// Total number of rows across tickers.
    pub fn len(&self) -> usize {
        self.series.values().map(BTreeMap::len).sum()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(symbol, _)| symbol.as_str())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.series.get(symbol).is_some_and(|rows| !rows.is_empty())
    }

    /// Most recent row for a ticker.
    pub fn latest(&self, symbol: &str) -> Option<&QuoteRow> {
        self.series
            .get(symbol)
            .and_then(|rows| rows.values().next_back())
    }

    /// All rows, ticker-major then time ascending.
    pub fn rows(&self) -> impl Iterator<Item = &QuoteRow> {
        self.series.values().flat_map(BTreeMap::values)
    }

    /// Keep only the latest row per ticker.
    pub fn tail(mut self) -> Self {
        for rows in self.series.values_mut() {
            if let Some((&last, _)) = rows.iter().next_back() {
                rows.retain(|ts, _| *ts == last);
            }
        }
        self.series.retain(|_, rows| !rows.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(symbol: &str, minute: u32, close: f64) -> QuoteRow {
        QuoteRow {
            symbol: symbol.into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 14, minute, 0).unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn empty_table_is_empty() {
        let table = QuoteTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.tickers().count(), 0);
    }

    #[test]
    fn tail_keeps_latest_row_per_ticker() {
        let table = QuoteTable::from_rows([
            row("MSFT", 1, 400.0),
            row("AAPL", 0, 150.0),
            row("AAPL", 2, 151.0),
            row("MSFT", 0, 399.0),
            row("AAPL", 1, 150.5),
        ])
        .tail();

        assert_eq!(table.len(), 2);
        assert_eq!(table.latest("AAPL").unwrap().close, 151.0);
        assert_eq!(table.latest("MSFT").unwrap().close, 400.0);
        assert_eq!(table.tickers().collect::<Vec<_>>(), ["AAPL", "MSFT"]);
    }

    #[test]
    fn same_key_replaces_row() {
        let table = QuoteTable::from_rows([row("AAPL", 0, 150.0), row("AAPL", 0, 152.0)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.latest("AAPL").unwrap().close, 152.0);
    }

    #[test]
    fn ticker_set_keeps_order_and_duplicates() {
        let set = TickerSet::new(["MSFT", "AAPL", "MSFT"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), ["MSFT", "AAPL", "MSFT"]);
        assert_eq!(set.len(), 3);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["MSFT","AAPL","MSFT"]"#);
    }
}
