//! reqwest-backed [`JsonFetcher`]

use super::{FetchError, FetchResult, JsonFetcher};
use async_trait::async_trait;
use std::time::Duration;

/// Default per-request timeout used by the pool API client
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_default_timeout() -> FetchResult<Self> {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> FetchResult<serde_json::Value> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_connect() {
        FetchError::Connection(err.to_string())
    } else if let Some(status) = err.status() {
        FetchError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    } else {
        FetchError::Request(err.to_string())
    }
}
