//! Production implementations of the pipeline's seams.

use std::time::Duration;

use async_trait::async_trait;
use brave_client::{BraveClient, BraveError};
use openai_client::{OpenAIClient, OpenAIError, StructuredRequest};
use tracing::warn;

use crate::error::{DiscoveryError, Result};
use crate::traits::{
    CompletionBackend, CompletionPayload, FetchedPage, PageFetcher, SearchHit, SearchProvider,
};

/// Plain reqwest-backed page fetcher.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpPageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: "EventDiscoveryBot/1.0".to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::FetchTimeout {
                        url: url.to_string(),
                    }
                } else {
                    DiscoveryError::FetchFailed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| DiscoveryError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            html,
        })
    }
}

/// Brave-backed search provider.
pub struct BraveSearchProvider {
    client: BraveClient,
}

impl BraveSearchProvider {
    pub fn new(client: BraveClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        let results = self.client.web_search(query, count).await.map_err(|e| {
            if matches!(e, BraveError::RateLimited) {
                warn!(query, "Brave search rate limited");
            }
            DiscoveryError::FetchFailed {
                url: "brave-search".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                description: r.description,
            })
            .collect())
    }
}

/// OpenAI-backed completion backend.
pub struct OpenAIBackend {
    client: OpenAIClient,
}

impl OpenAIBackend {
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    async fn complete(&self, payload: &CompletionPayload) -> Result<String> {
        let request = StructuredRequest::new(
            &payload.model,
            &payload.system,
            &payload.user,
            payload.schema.clone(),
        );

        self.client
            .structured_output(&request)
            .await
            .map_err(|e| match e {
                OpenAIError::RateLimited { .. } => DiscoveryError::RateLimited,
                OpenAIError::Server { status, message } => {
                    DiscoveryError::ServerError(format!("{}: {}", status, message))
                }
                OpenAIError::Network(message) => DiscoveryError::ServerError(message),
                OpenAIError::Api { status, message } => {
                    DiscoveryError::ServerError(format!("{}: {}", status, message))
                }
                OpenAIError::Parse(message) => DiscoveryError::ParseFailed(message),
                OpenAIError::Config(message) => DiscoveryError::ConfigurationMissing(message),
            })
    }
}
