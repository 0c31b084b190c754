//! Object store access
//!
//! Path-style HTTP client for the S3-compatible store emulator. The
//! harness only ever creates the bucket and reads objects back; every
//! checkpoint object is written by the worker under test.

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{HarnessError, HarnessResult};

pub struct StoreClient {
    base_url: String,
    bucket: String,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(endpoint: &str, bucket: &str) -> HarnessResult<Self> {
        let base_url = endpoint.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(StoreClient {
            base_url,
            bucket: bucket.to_string(),
            http,
        })
    }

    /// Ensure the bucket exists. A conflict response means it already
    /// does, which is fine for a re-run against a dirty emulator.
    pub async fn create_bucket(&self) -> HarnessResult<()> {
        let url = format!("{}/{}", self.base_url, self.bucket);
        let response = self.http.put(&url).send().await?;
        let status = response.status();

        if status.is_success() || status == StatusCode::CONFLICT {
            tracing::info!("🪣 Bucket '{}' ready", self.bucket);
            Ok(())
        } else {
            Err(HarnessError::Setup {
                message: format!("creating bucket '{}' returned {status}", self.bucket),
            })
        }
    }

    /// Fetch an object's full content; `None` when the key does not exist.
    pub async fn get_object(&self, key: &str) -> HarnessResult<Option<Vec<u8>>> {
        let url = format!("{}/{}/{}", self.base_url, self.bucket, key);
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.bytes().await?.to_vec()))
    }
}
