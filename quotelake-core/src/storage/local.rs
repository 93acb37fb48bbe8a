//! Filesystem object store.
//!
//! Layout: `{root}/{key}`, so partition keys become Hive-style directories
//! (`{root}/stock_data/year=2026/month=01/day=01/prices_14-00-00.json`).
//! Writes are atomic: write to `.tmp`, then rename into place.

use super::{validate_key, ObjectStore, StorageError};
use std::fs;
use std::path::PathBuf;

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path for a key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &str {
        "local"
    }

    fn uri(&self, key: &str) -> String {
        format!("file://{}", self.path_for(key).display())
    }

    fn put_object(&self, key: &str, body: &[u8], _content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, body).map_err(io_err)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_err(e)
        })?;

        Ok(())
    }
}
