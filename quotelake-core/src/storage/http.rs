//! S3-compatible object store over plain HTTP PUT.
//!
//! Objects go to `{endpoint}/{bucket}/{key}` (path-style addressing).
//! Requests are unsigned: access is granted by the environment (bucket
//! policy, network placement, or a signing proxy in front of the endpoint).

use super::{validate_key, ObjectStore, StorageError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

pub struct HttpObjectStore {
    client: reqwest::blocking::Client,
    endpoint: Url,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let bucket = bucket.into();
        let endpoint = Url::parse(endpoint).map_err(|e| StorageError::Transport {
            key: String::new(),
            message: format!("invalid endpoint '{endpoint}': {e}"),
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport {
                key: String::new(),
                message: format!("http client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint,
            bucket,
        })
    }

    /// Full object URL for a key.
    pub fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidKey(key.to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        Ok(url)
    }
}

impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }

    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let url = self.object_url(key)?;
        debug!(%url, bytes = body.len(), "putting object");

        let resp = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .map_err(|e| StorageError::Transport {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
