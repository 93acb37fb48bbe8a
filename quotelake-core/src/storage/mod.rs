//! Object storage capability handed to the partition writer.
//!
//! The store is an opaque key/value blob sink. Backends:
//! - `LocalObjectStore` — a directory tree, one file per key
//! - `HttpObjectStore` — PUT against an S3-compatible endpoint
//! - `MemoryObjectStore` — in-process map for dry runs and tests

pub mod http;
pub mod local;
pub mod memory;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;
pub use memory::{MemoryObjectStore, StoredBlob};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("I/O error writing '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error writing '{key}': {message}")]
    Transport { key: String, message: String },

    #[error("store rejected '{key}' with HTTP {status}")]
    Rejected { key: String, status: u16 },
}

/// A durable blob store keyed by slash-separated paths.
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Human-readable location of a key, e.g. `s3://bucket/key`.
    fn uri(&self, key: &str) -> String;

    /// Store `body` under `key`, replacing whatever was there.
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError>;
}

/// Reject keys that could escape the store root or address nothing.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
