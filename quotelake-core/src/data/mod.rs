//! Quote fetching: provider trait, Yahoo Finance implementation, static rows.

pub mod provider;
pub mod yahoo;

pub use provider::{FetchError, QuoteProvider, StaticProvider, YAHOO_SOURCE};
pub use yahoo::YahooProvider;
