//! Yahoo Finance quote provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API, one request per ticker
//! (the chart endpoint takes a single symbol). There is no retry here: a
//! transport or status failure is returned to the caller as a `FetchError`.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parsing failures surface as `ResponseFormatChanged`.

use super::provider::{FetchError, QuoteProvider};
use crate::config::ProviderConfig;
use crate::domain::{Interval, Period, QuoteRow, QuoteTable, TickerSet};
use chrono::DateTime;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Yahoo Finance chart provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FetchError::NetworkUnreachable(format!("invalid base url '{}': {e}", config.base_url))
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::NetworkUnreachable(format!("http client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Build the chart API URL for a symbol.
    fn chart_url(&self, symbol: &str, period: Period, interval: Interval) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::NetworkUnreachable(format!(
                    "base url cannot hold a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", period.as_str())
            .append_pair("interval", interval.as_str())
            .append_pair("includePrePost", "false");
        Ok(url)
    }

    /// Fetch and parse the bars for one symbol.
    fn fetch_symbol(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<QuoteRow>, FetchError> {
        let url = self.chart_url(symbol, period, interval)?;
        debug!(%symbol, %url, "requesting chart");

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(%symbol, "provider does not know symbol");
            return Ok(Vec::new());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited { retry_after_secs });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::AuthenticationRequired(format!(
                "Yahoo Finance refused the request for {symbol} (HTTP {status})"
            )));
        }

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        parse_response(symbol, chart)
    }
}

/// Parse the chart API response into rows.
///
/// A "Not Found" chart error or a result without timestamps is the
/// provider's way of saying "no data": both produce an empty vec.
fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<QuoteRow>, FetchError> {
    let Some(results) = resp.chart.result else {
        return match resp.chart.error {
            Some(err) if err.code == "Not Found" => Ok(Vec::new()),
            Some(err) => Err(FetchError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            ))),
            None => Err(FetchError::ResponseFormatChanged(
                "empty result with no error".into(),
            )),
        };
    };

    let Some(data) = results.into_iter().next() else {
        return Ok(Vec::new());
    };

    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
            FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
        })?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Bars with nothing filled in are placeholders for the current minute
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }

        rows.push(QuoteRow {
            symbol: symbol.to_string(),
            timestamp,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume: volume.unwrap_or(0),
        });
    }

    Ok(rows)
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        super::provider::YAHOO_SOURCE
    }

    fn fetch(
        &self,
        tickers: &TickerSet,
        period: Period,
        interval: Interval,
    ) -> Result<QuoteTable, FetchError> {
        let mut table = QuoteTable::new();
        for symbol in tickers.iter() {
            if table.contains(symbol) {
                continue;
            }
            for row in self.fetch_symbol(symbol, period, interval)? {
                table.insert(row);
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parse(json: &str) -> Result<Vec<QuoteRow>, FetchError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_response("AAPL", resp)
    }

    #[test]
    fn parses_intraday_bars_and_skips_placeholders() {
        let rows = parse(
            r#"{"chart":{"result":[{
                "meta":{"symbol":"AAPL"},
                "timestamp":[1767276000,1767276060,1767276120],
                "indicators":{"quote":[{
                    "open":[150.0,150.9,null],
                    "high":[151.2,151.0,null],
                    "low":[149.8,150.5,null],
                    "close":[150.9,150.7,null],
                    "volume":[1000000,2000,null]
                }]}
            }],"error":null}}"#,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap());
        assert_eq!(rows[0].open, 150.0);
        assert_eq!(rows[0].volume, 1_000_000);
        assert_eq!(rows[1].close, 150.7);
    }

    #[test]
    fn partial_nulls_become_nan() {
        let rows = parse(
            r#"{"chart":{"result":[{
                "timestamp":[1767276000],
                "indicators":{"quote":[{
                    "open":[null],"high":[151.2],"low":[149.8],"close":[150.9],"volume":[null]
                }]}
            }],"error":null}}"#,
        )
        .unwrap();

        assert!(rows[0].open.is_nan());
        assert_eq!(rows[0].volume, 0);
    }

    #[test]
    fn not_found_error_is_empty_not_failure() {
        let rows = parse(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_timestamps_is_empty() {
        let rows = parse(
            r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn other_chart_errors_are_format_failures() {
        let err = parse(
            r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::ResponseFormatChanged(msg) if msg.contains("Bad Request")));
    }

    #[test]
    fn chart_url_carries_range_and_interval() {
        let provider = YahooProvider::new(&ProviderConfig::default()).unwrap();
        let url = provider
            .chart_url("AAPL", Period::FiveDays, Interval::FiveMinutes)
            .unwrap();
        assert_eq!(url.path(), "/v8/finance/chart/AAPL");
        let query = url.query().unwrap();
        assert!(query.contains("range=5d"));
        assert!(query.contains("interval=5m"));
    }
}
