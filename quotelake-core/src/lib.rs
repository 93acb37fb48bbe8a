//! Quotelake Core — quote ingestion into a time-partitioned landing zone.
//!
//! - Quote fetching from Yahoo Finance (or static rows)
//! - Record shaping, stacked or per-ticker
//! - Partitioned writes to an injected object store
//! - The ingestion handler mapping outcomes to 200/404/500
//! - The downstream transformation schedule and its step runner

pub mod config;
pub mod data;
pub mod domain;
pub mod handler;
pub mod partition;
pub mod schedule;
pub mod shape;
pub mod storage;

pub use config::{ConfigError, IngestConfig};
pub use handler::{Clock, FixedClock, IngestRequest, IngestResponse, IngestionHandler, SystemClock};
pub use partition::{PartitionKey, PartitionWriter, StoredObject};
