//! Transport layer for the pool HTTP API
//!
//! The aggregator only needs one capability from the network: fetch a URL
//! and hand back the decoded JSON body. Everything else (timeouts, status
//! handling, connection errors) is classified here into [`FetchError`].

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpFetcher;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("API connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API request failed: {0}")]
    Request(String),

    #[error("Invalid JSON body: {0}")]
    Decode(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Single-shot JSON GET
///
/// Implementations perform exactly one request per call; no retries.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> FetchResult<serde_json::Value>;
}

#[async_trait]
impl<T: JsonFetcher + ?Sized> JsonFetcher for std::sync::Arc<T> {
    async fn fetch_json(&self, url: &str) -> FetchResult<serde_json::Value> {
        (**self).fetch_json(url).await
    }
}
