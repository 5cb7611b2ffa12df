//! Injectable seams for the external collaborators.
//!
//! Everything unreliable (web search, third-party HTML, the completion
//! API, durable storage) sits behind one of these traits so tests can
//! substitute deterministic fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A ranked result from the external web-search API.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// External web-search API (query string → ranked results).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>>;
}

/// A fetched third-party page. Untrusted, unstructured input.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub html: String,
}

/// Fetches arbitrary third-party HTML with a per-request timeout.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage>;
}

/// One structured-output completion request.
///
/// Serialized form doubles as the content-addressed cache identity.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub model: String,
    pub system: String,
    pub user: String,
    pub schema: serde_json::Value,
}

impl CompletionPayload {
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            schema,
        }
    }

    /// Content-addressed key: SHA-256 over the serialized payload.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}

/// External completion API supporting a structured-output contract.
/// Returns the raw JSON string matching the payload's schema.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, payload: &CompletionPayload) -> Result<String>;
}
