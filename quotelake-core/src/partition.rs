//! Time-partitioned landing of record batches.
//!
//! Key layout: `{prefix}/year=YYYY/month=MM/day=DD/prices_HH-MM-SS.json`
//!
//! The key resolves to the second, so two writes inside the same second
//! land on the same key and the later one wins.

use crate::shape::RecordBatch;
use crate::storage::{ObjectStore, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "stock_data";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to serialize record batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage write failed: {0}")]
    Storage(#[from] StorageError),
}

/// Deterministic storage key derived from a capture time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(prefix: &str, captured_at: DateTime<Utc>) -> Self {
        Self(format!(
            "{prefix}/{}",
            captured_at.format("year=%Y/month=%m/day=%d/prices_%H-%M-%S.json")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The artifact a successful write leaves in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: PartitionKey,
    pub uri: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// blake3 hex digest of `body`.
    pub content_hash: String,
}

impl StoredObject {
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Body as UTF-8 text. Serialized batches are always valid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Serializes a batch and performs exactly one put per call.
pub struct PartitionWriter<'a> {
    store: &'a dyn ObjectStore,
    prefix: String,
}

impl<'a> PartitionWriter<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self::with_prefix(store, DEFAULT_PREFIX)
    }

    pub fn with_prefix(store: &'a dyn ObjectStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn key_for(&self, captured_at: DateTime<Utc>) -> PartitionKey {
        PartitionKey::new(&self.prefix, captured_at)
    }

    pub fn write(
        &self,
        batch: &RecordBatch,
        captured_at: DateTime<Utc>,
    ) -> Result<StoredObject, WriteError> {
        let key = self.key_for(captured_at);
        let body = serde_json::to_vec(batch)?;

        self.store
            .put_object(key.as_str(), &body, JSON_CONTENT_TYPE)?;

        let content_hash = blake3::hash(&body).to_hex().to_string();
        Ok(StoredObject {
            uri: self.store.uri(key.as_str()),
            key,
            body,
            content_type: JSON_CONTENT_TYPE,
            content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::FlatQuote;
    use crate::storage::MemoryObjectStore;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, m, s).unwrap()
    }

    fn batch() -> RecordBatch {
        RecordBatch::Stacked(vec![FlatQuote {
            datetime: "2026-01-01T14:00:00.000Z".into(),
            ticker: "AAPL".into(),
            close: 150.9,
            high: 151.2,
            low: 149.8,
            open: 150.0,
            volume: 1_000_000,
        }])
    }

    #[test]
    fn key_layout_is_hive_partitioned() {
        let key = PartitionKey::new(DEFAULT_PREFIX, at(14, 0, 0));
        assert_eq!(
            key.as_str(),
            "stock_data/year=2026/month=01/day=01/prices_14-00-00.json"
        );
    }

    #[test]
    fn same_second_collides_and_next_second_does_not() {
        let base = at(9, 5, 7);
        let same = base + chrono::Duration::milliseconds(999);
        let next = base + chrono::Duration::seconds(1);
        assert_eq!(PartitionKey::new("p", base), PartitionKey::new("p", same));
        assert_ne!(PartitionKey::new("p", base), PartitionKey::new("p", next));
    }

    #[test]
    fn write_puts_once_with_json_content_type() {
        let store = MemoryObjectStore::new("bucket");
        let writer = PartitionWriter::new(&store);

        let stored = writer.write(&batch(), at(14, 0, 0)).unwrap();

        assert_eq!(store.put_count(), 1);
        let blob = store.get(stored.key.as_str()).unwrap();
        assert_eq!(blob.content_type, "application/json");
        assert_eq!(blob.body, stored.body);
        assert_eq!(stored.content_hash, blake3::hash(&blob.body).to_hex().to_string());
        assert_eq!(
            stored.uri,
            "memory://bucket/stock_data/year=2026/month=01/day=01/prices_14-00-00.json"
        );

        let parsed: serde_json::Value = serde_json::from_slice(&blob.body).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn custom_prefix_is_trimmed() {
        let store = MemoryObjectStore::new("bucket");
        let writer = PartitionWriter::with_prefix(&store, "/landing/raw/");
        assert_eq!(
            writer.key_for(at(0, 0, 1)).as_str(),
            "landing/raw/year=2026/month=01/day=01/prices_00-00-01.json"
        );
    }
}
