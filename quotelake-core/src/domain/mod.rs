//! Domain types: tickers, quote rows, the quote table, period and interval.

pub mod quote;
pub mod range;

pub use quote::{QuoteRow, QuoteTable, TickerSet};
pub use range::{Interval, Period, RangeParseError};
