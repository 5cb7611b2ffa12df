//! Pure Brave Search REST API client.
//!
//! A minimal client for the Brave web search API. One call per query,
//! subscription-token auth, no domain-specific logic.
//!
//! # Example
//!
//! ```rust,ignore
//! use brave_client::BraveClient;
//!
//! let client = BraveClient::new("your-subscription-token".into());
//!
//! let results = client.web_search("yoga classes san francisco", 10).await?;
//! for result in &results {
//!     println!("{}", result.url);
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{BraveError, Result};
pub use types::{SearchResponse, WebResult};

const BASE_URL: &str = "https://api.search.brave.com/res/v1";

pub struct BraveClient {
    client: reqwest::Client,
    token: String,
}

impl BraveClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// Run a web search and return the ranked results.
    ///
    /// `count` is clamped to Brave's documented 1..=20 per-request window.
    pub async fn web_search(&self, query: &str, count: usize) -> Result<Vec<WebResult>> {
        let count = count.clamp(1, 20);

        let resp = self
            .client
            .get(format!("{}/web/search", BASE_URL))
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.token)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            tracing::warn!(query, "Brave search rate limited");
            return Err(BraveError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BraveError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SearchResponse = resp.json().await?;
        let results = parsed.web.map(|w| w.results).unwrap_or_default();

        tracing::debug!(query, count = results.len(), "Brave search completed");
        Ok(results)
    }
}
