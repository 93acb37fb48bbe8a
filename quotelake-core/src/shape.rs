//! Record shaping: turn a quote table into a JSON-serializable batch.
//!
//! Two shapings exist side by side and are not interchangeable:
//! - `shape_stacked` flattens every row the table holds into a
//!   `{Datetime, Ticker, Close, High, Low, Open, Volume}` record. Tickers the
//!   provider left out simply do not appear.
//! - `shape_per_ticker` walks the requested tickers and builds one nested
//!   `Record` each. A requested ticker missing from the table is an error.

use crate::domain::{Interval, QuoteRow, QuoteTable, TickerSet};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("ticker '{symbol}' not present in fetched data")]
    KeyLookup { symbol: String },
}

/// Price fields of a constructed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Static provenance of a constructed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub source: String,
    pub interval: Interval,
}

/// One self-contained record per ticker, stamped with the capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub symbol: String,
    pub timestamp: String,
    pub price_data: PriceData,
    pub meta: RecordMeta,
}

/// One stacked row: the bar time and ticker sit beside the price columns.
///
/// Field order and capitalisation follow the columnar frame the landing
/// layout was first written from, which downstream models select by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatQuote {
    #[serde(rename = "Datetime")]
    pub datetime: String,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
}

impl From<&QuoteRow> for FlatQuote {
    fn from(row: &QuoteRow) -> Self {
        Self {
            datetime: iso_millis(row.timestamp),
            ticker: row.symbol.clone(),
            close: row.close,
            high: row.high,
            low: row.low,
            open: row.open,
            volume: row.volume,
        }
    }
}

/// Ordered batch of shaped records; serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordBatch {
    Stacked(Vec<FlatQuote>),
    Constructed(Vec<Record>),
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            Self::Stacked(rows) => rows.len(),
            Self::Constructed(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Which shaping a call site uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapingStrategy {
    #[default]
    Stacked,
    PerTicker,
}

impl fmt::Display for ShapingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stacked => f.write_str("stacked"),
            Self::PerTicker => f.write_str("per_ticker"),
        }
    }
}

impl FromStr for ShapingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stacked" => Ok(Self::Stacked),
            "per_ticker" => Ok(Self::PerTicker),
            other => Err(format!("unknown shaping strategy '{other}'")),
        }
    }
}

/// Flatten every row of the table, ticker-major.
pub fn shape_stacked(table: &QuoteTable) -> RecordBatch {
    RecordBatch::Stacked(table.rows().map(FlatQuote::from).collect())
}

/// Build one record per requested ticker from its latest row.
pub fn shape_per_ticker(
    table: &QuoteTable,
    tickers: &TickerSet,
    captured_at: DateTime<Utc>,
    interval: Interval,
) -> Result<RecordBatch, ShapeError> {
    let timestamp = captured_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    let records = tickers
        .iter()
        .map(|symbol| {
            let row = table.latest(symbol).ok_or_else(|| ShapeError::KeyLookup {
                symbol: symbol.to_string(),
            })?;
            Ok(Record {
                symbol: symbol.to_string(),
                timestamp: timestamp.clone(),
                price_data: PriceData {
                    open: row.open,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                    volume: row.volume,
                },
                meta: RecordMeta {
                    source: crate::data::YAHOO_SOURCE.to_string(),
                    interval,
                },
            })
        })
        .collect::<Result<Vec<_>, ShapeError>>()?;

    Ok(RecordBatch::Constructed(records))
}

/// Shape with the given strategy.
pub fn shape(
    strategy: ShapingStrategy,
    table: &QuoteTable,
    tickers: &TickerSet,
    captured_at: DateTime<Utc>,
    interval: Interval,
) -> Result<RecordBatch, ShapeError> {
    match strategy {
        ShapingStrategy::Stacked => Ok(shape_stacked(table)),
        ShapingStrategy::PerTicker => shape_per_ticker(table, tickers, captured_at, interval),
    }
}

fn iso_millis(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap()
    }

    fn aapl() -> QuoteRow {
        QuoteRow {
            symbol: "AAPL".into(),
            timestamp: t0(),
            open: 150.0,
            high: 151.2,
            low: 149.8,
            close: 150.9,
            volume: 1_000_000,
        }
    }

    fn msft() -> QuoteRow {
        QuoteRow {
            symbol: "MSFT".into(),
            close: 410.25,
            ..aapl()
        }
    }

    #[test]
    fn stacked_rows_keep_numeric_types() {
        let batch = shape_stacked(&QuoteTable::from_rows([aapl()]));
        let json: Value = serde_json::from_str(&batch.to_json().unwrap()).unwrap();

        let first = &json[0];
        assert_eq!(first["Datetime"], "2026-01-01T14:00:00.000Z");
        assert_eq!(first["Ticker"], "AAPL");
        assert_eq!(first["Open"], 150.0);
        assert_eq!(first["Close"], 150.9);
        assert!(first["Volume"].is_u64());
        assert_eq!(first["Volume"], 1_000_000);
    }

    #[test]
    fn stacked_silently_omits_missing_ticker() {
        let table = QuoteTable::from_rows([msft(), aapl()]);
        let batch = shape_stacked(&table);
        let RecordBatch::Stacked(rows) = batch else {
            panic!("expected stacked batch");
        };
        let tickers: Vec<_> = rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, ["AAPL", "MSFT"]);
    }

    #[test]
    fn per_ticker_builds_nested_record() {
        let table = QuoteTable::from_rows([aapl()]);
        let batch =
            shape_per_ticker(&table, &TickerSet::single("AAPL"), t0(), Interval::OneMinute).unwrap();
        let json: Value = serde_json::from_str(&batch.to_json().unwrap()).unwrap();

        assert_eq!(json.as_array().unwrap().len(), 1);
        let record = &json[0];
        assert_eq!(record["symbol"], "AAPL");
        assert_eq!(record["timestamp"], "2026-01-01T14:00:00Z");
        assert_eq!(record["price_data"]["high"], 151.2);
        assert_eq!(record["price_data"]["volume"], 1_000_000);
        assert_eq!(record["meta"]["source"], "yahoo_finance");
        assert_eq!(record["meta"]["interval"], "1m");
    }

    #[test]
    fn per_ticker_missing_symbol_is_lookup_error() {
        let table = QuoteTable::from_rows([aapl()]);
        let err = shape_per_ticker(
            &table,
            &TickerSet::new(["AAPL", "ZZZZ"]),
            t0(),
            Interval::OneMinute,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShapeError::KeyLookup {
                symbol: "ZZZZ".into()
            }
        );
    }

    #[test]
    fn per_ticker_follows_request_order() {
        let table = QuoteTable::from_rows([aapl(), msft()]);
        let batch = shape_per_ticker(
            &table,
            &TickerSet::new(["MSFT", "AAPL"]),
            t0(),
            Interval::FiveMinutes,
        )
        .unwrap();
        let RecordBatch::Constructed(records) = batch else {
            panic!("expected constructed batch");
        };
        assert_eq!(records[0].symbol, "MSFT");
        assert_eq!(records[1].symbol, "AAPL");
    }

    #[test]
    fn strategy_parses_from_config_spelling() {
        assert_eq!("per-ticker".parse::<ShapingStrategy>(), Ok(ShapingStrategy::PerTicker));
        assert_eq!("stacked".parse::<ShapingStrategy>(), Ok(ShapingStrategy::Stacked));
        assert!("pivot".parse::<ShapingStrategy>().is_err());
    }
}
