//! Ingestion configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) gives the
//! production setup: Yahoo chart API, 1d/1m bars, `["AAPL"]`, stacked
//! shaping, and a local landing directory.
//!
//! ```toml
//! [provider]
//! period = "1d"
//! interval = "1m"
//!
//! [storage]
//! backend = "http"
//! endpoint = "http://localhost:9000"
//! bucket = "yfinance-stock-data"
//!
//! [handler]
//! default_tickers = ["AAPL", "MSFT"]
//! shaping = "stacked"
//! ```

use crate::domain::{Interval, Period};
use crate::partition::DEFAULT_PREFIX;
use crate::shape::ShapingStrategy;
use crate::storage::{HttpObjectStore, LocalObjectStore, MemoryObjectStore, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BUCKET: &str = "yfinance-stock-data";
pub const ENV_BUCKET: &str = "QUOTELAKE_BUCKET";
pub const ENV_STORAGE_ROOT: &str = "QUOTELAKE_STORAGE_ROOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IngestConfig {
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub handler: HandlerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub period: Period,
    pub interval: Interval,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".into(),
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            period: Period::OneDay,
            interval: Interval::OneMinute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Http,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the local backend.
    pub root: PathBuf,
    /// S3-compatible endpoint for the http backend.
    pub endpoint: Option<String>,
    pub bucket: String,
    pub prefix: String,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("landing"),
            endpoint: None,
            bucket: DEFAULT_BUCKET.into(),
            prefix: DEFAULT_PREFIX.into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Tickers used when a trigger carries none.
    pub default_tickers: Vec<String>,
    pub shaping: ShapingStrategy,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            default_tickers: vec!["AAPL".into()],
            shaping: ShapingStrategy::Stacked,
        }
    }
}

impl IngestConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QUOTELAKE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup(ENV_BUCKET).filter(|v| !v.is_empty()) {
            self.storage.bucket = bucket;
        }
        if let Some(root) = lookup(ENV_STORAGE_ROOT).filter(|v| !v.is_empty()) {
            self.storage.root = PathBuf::from(root);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handler.default_tickers.is_empty() {
            return Err(ConfigError::Invalid(
                "handler.default_tickers must name at least one ticker".into(),
            ));
        }
        if self.storage.backend == StorageBackend::Http && self.storage.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "storage.endpoint is required for the http backend".into(),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must not be empty".into()));
        }
        let prefix = self.storage.prefix.trim_matches('/');
        if prefix.is_empty() || prefix.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(ConfigError::Invalid(format!(
                "storage.prefix '{}' is not a usable key prefix",
                self.storage.prefix
            )));
        }
        Ok(())
    }

    /// Build the configured object store.
    pub fn build_store(&self) -> Result<Box<dyn ObjectStore>, ConfigError> {
        let storage = &self.storage;
        let store: Box<dyn ObjectStore> = match storage.backend {
            StorageBackend::Local => Box::new(LocalObjectStore::new(&storage.root)),
            StorageBackend::Memory => Box::new(MemoryObjectStore::new(&storage.bucket)),
            StorageBackend::Http => {
                let endpoint = storage.endpoint.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("storage.endpoint is required for the http backend".into())
                })?;
                Box::new(
                    HttpObjectStore::new(
                        endpoint,
                        &storage.bucket,
                        Duration::from_secs(storage.timeout_secs),
                    )
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?,
                )
            }
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_production_defaults() {
        let config = IngestConfig::from_toml("").unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.handler.default_tickers, ["AAPL"]);
        assert_eq!(config.provider.period, Period::OneDay);
        assert_eq!(config.provider.interval, Interval::OneMinute);
        assert_eq!(config.storage.bucket, "yfinance-stock-data");
        assert_eq!(config.storage.prefix, "stock_data");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = IngestConfig::from_toml(
            r#"
            [provider]
            interval = "5m"

            [handler]
            default_tickers = ["MSFT", "NVDA"]
            shaping = "per_ticker"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.interval, Interval::FiveMinutes);
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.handler.shaping, ShapingStrategy::PerTicker);
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn http_backend_needs_endpoint() {
        let err = IngestConfig::from_toml("[storage]\nbackend = \"http\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("endpoint")));
    }

    #[test]
    fn empty_default_tickers_rejected() {
        let err = IngestConfig::from_toml("[handler]\ndefault_tickers = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unusable_prefix_rejected() {
        for prefix in ["", "/", "//", "a//b", "a/../b", "./raw"] {
            let err = IngestConfig::from_toml(&format!("[storage]\nprefix = \"{prefix}\"\n"))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid(ref msg) if msg.contains("prefix")),
                "{prefix:?} should be rejected, got {err:?}"
            );
        }

        let config = IngestConfig::from_toml("[storage]\nprefix = \"/landing/raw/\"\n").unwrap();
        assert_eq!(config.storage.prefix, "/landing/raw/");
    }

    #[test]
    fn bad_interval_is_parse_error() {
        let err = IngestConfig::from_toml("[provider]\ninterval = \"7m\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overrides_replace_bucket_and_root() {
        let mut config = IngestConfig::default();
        config.apply_overrides(|name| match name {
            ENV_BUCKET => Some("other-bucket".into()),
            ENV_STORAGE_ROOT => Some("/tmp/landing".into()),
            _ => None,
        });
        assert_eq!(config.storage.bucket, "other-bucket");
        assert_eq!(config.storage.root, PathBuf::from("/tmp/landing"));
    }

    #[test]
    fn builds_each_backend() {
        let mut config = IngestConfig::default();
        assert_eq!(config.build_store().unwrap().name(), "local");

        config.storage.backend = StorageBackend::Memory;
        assert_eq!(config.build_store().unwrap().name(), "memory");

        config.storage.backend = StorageBackend::Http;
        config.storage.endpoint = Some("http://localhost:9000".into());
        assert_eq!(config.build_store().unwrap().name(), "http");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = IngestConfig::from_file(Path::new("/nonexistent/quotelake.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
