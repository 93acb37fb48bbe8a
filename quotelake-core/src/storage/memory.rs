//! In-process object store.

use super::{validate_key, ObjectStore, StorageError};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// What a put left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredBlob>>,
    puts: Mutex<usize>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Number of put calls observed, including overwrites.
    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn uri(&self, key: &str) -> String {
        format!("memory://{}/{key}", self.bucket)
    }

    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        *self.puts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                key.to_string(),
                StoredBlob {
                    body: body.to_vec(),
                    content_type: content_type.to_string(),
                },
            );
        Ok(())
    }
}
