//! Mock implementations of the pipeline's seams.
//!
//! Deterministic, configurable fakes for tests that must not touch the
//! network: a completion backend with canned responses, a search
//! provider, and a page fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{DiscoveryError, Result};
use crate::traits::{
    CompletionBackend, CompletionPayload, FetchedPage, PageFetcher, SearchHit, SearchProvider,
};

enum CannedResponse {
    Ok(String),
    RateLimited,
    ServerError(String),
}

impl CannedResponse {
    fn produce(&self) -> Result<String> {
        match self {
            CannedResponse::Ok(s) => Ok(s.clone()),
            CannedResponse::RateLimited => Err(DiscoveryError::RateLimited),
            CannedResponse::ServerError(m) => Err(DiscoveryError::ServerError(m.clone())),
        }
    }
}

/// Mock completion backend with canned responses and call tracking.
///
/// Rules match on a substring of the payload's system prompt, so one mock
/// can serve the suggestion, validation, and ranking stages differently.
pub struct MockBackend {
    default: Mutex<CannedResponse>,
    rules: Mutex<Vec<(String, String)>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    instants: Mutex<Vec<Instant>>,
    payloads: Mutex<Vec<CompletionPayload>>,
}

impl MockBackend {
    pub fn ok(response: &str) -> Self {
        Self::with_default(CannedResponse::Ok(response.to_string()))
    }

    pub fn rate_limited() -> Self {
        Self::with_default(CannedResponse::RateLimited)
    }

    pub fn server_error(message: &str) -> Self {
        Self::with_default(CannedResponse::ServerError(message.to_string()))
    }

    fn with_default(default: CannedResponse) -> Self {
        Self {
            default: Mutex::new(default),
            rules: Mutex::new(Vec::new()),
            latency: None,
            calls: AtomicUsize::new(0),
            instants: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Simulate call latency (useful under paused time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Respond with `response` when the system prompt contains `needle`.
    pub fn with_rule(self, needle: &str, response: &str) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), response.to_string()));
        self
    }

    /// Swap the default response for an Ok.
    pub fn set_response_ok(&self, response: &str) {
        *self.default.lock().unwrap() = CannedResponse::Ok(response.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.instants.lock().unwrap().clone()
    }

    pub fn recorded_payloads(&self) -> Vec<CompletionPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, payload: &CompletionPayload) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.instants.lock().unwrap().push(Instant::now());
        self.payloads.lock().unwrap().push(payload.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let matched = {
            let rules = self.rules.lock().unwrap();
            rules
                .iter()
                .find(|(needle, _)| payload.system.contains(needle))
                .map(|(_, response)| response.clone())
        };
        match matched {
            Some(response) => Ok(response),
            None => self.default.lock().unwrap().produce(),
        }
    }
}

/// Mock search provider with per-query canned hits.
#[derive(Default)]
pub struct MockSearch {
    by_query: Mutex<HashMap<String, Vec<SearchHit>>>,
    fallback: Mutex<Vec<SearchHit>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned hits for an exact query.
    pub fn with_results(self, query: &str, urls: &[&str]) -> Self {
        self.by_query
            .lock()
            .unwrap()
            .insert(query.to_string(), hits_from(urls));
        self
    }

    /// Canned hits returned for any query without an exact rule.
    pub fn with_any(self, urls: &[&str]) -> Self {
        *self.fallback.lock().unwrap() = hits_from(urls);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

fn hits_from(urls: &[&str]) -> Vec<SearchHit> {
    urls.iter()
        .map(|u| SearchHit {
            url: u.to_string(),
            title: None,
            description: None,
        })
        .collect()
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, _count: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(hits) = self.by_query.lock().unwrap().get(query) {
            return Ok(hits.clone());
        }
        Ok(self.fallback.lock().unwrap().clone())
    }
}

/// Mock page fetcher with canned HTML per URL.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, FailureKind>>,
    latency: Option<Duration>,
    fetched: Mutex<Vec<String>>,
}

#[derive(Clone, Copy)]
enum FailureKind {
    Timeout,
    Failed,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_failure(self, url: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), FailureKind::Failed);
        self
    }

    pub fn with_timeout(self, url: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), FailureKind::Timeout);
        self
    }

    /// Simulate fetch latency (useful under paused time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetched.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
        self.fetched.lock().unwrap().push(url.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(kind) = self.failures.lock().unwrap().get(url) {
            return Err(match kind {
                FailureKind::Timeout => DiscoveryError::FetchTimeout {
                    url: url.to_string(),
                },
                FailureKind::Failed => DiscoveryError::FetchFailed {
                    url: url.to_string(),
                    reason: "HTTP 500".to_string(),
                },
            });
        }

        match self.pages.lock().unwrap().get(url) {
            Some(html) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                html: html.clone(),
            }),
            None => Err(DiscoveryError::FetchFailed {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            }),
        }
    }
}
