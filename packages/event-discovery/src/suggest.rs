//! Per-city website suggestions.
//!
//! One completion call per city every few days suggests local listing
//! sites; the result lives in a durable cache so repeated discovery runs
//! never pay for the same suggestion twice.

use std::sync::Arc;
use std::time::Duration;

use openai_client::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gate::CompletionGate;
use crate::storage::EventStore;
use crate::traits::CompletionPayload;
use crate::types::WebsiteCandidate;

/// A suggested local listing site.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SuggestedSite {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SuggestionReport {
    sites: Vec<SuggestedSite>,
}

pub struct SuggestionService {
    gate: Arc<CompletionGate>,
    store: Arc<dyn EventStore>,
    model: String,
    ttl: Duration,
    cache_ttl: Duration,
}

impl SuggestionService {
    pub fn new(
        gate: Arc<CompletionGate>,
        store: Arc<dyn EventStore>,
        model: String,
        ttl: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            gate,
            store,
            model,
            ttl,
            cache_ttl,
        }
    }

    /// Candidate sites for a city, served from the durable cache when
    /// fresh. Never errors: a failed suggestion call just contributes
    /// nothing to the run.
    pub async fn candidate_sites(&self, city: &str) -> Vec<WebsiteCandidate> {
        match self.store.get_site_suggestions(city).await {
            Ok(Some(record)) => {
                let age = chrono::Utc::now() - record.suggested_at;
                if age.to_std().map(|a| a < self.ttl).unwrap_or(false) {
                    debug!(city, count = record.sites.len(), "Suggestion cache hit");
                    return to_candidates(record.sites);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(city, error = %e, "Failed to read suggestion cache"),
        }

        let payload = CompletionPayload::new(
            &self.model,
            "You suggest websites that list local in-person events: city event \
             calendars, venue pages, community boards, and alt-weekly listings. \
             Return full https URLs of real sites only, never aggregators like \
             Meetup or Facebook.",
            format!("Suggest up to 8 event listing websites for {}.", city),
            SuggestionReport::openai_schema(),
        );

        match self.gate.invoke(&payload, self.cache_ttl, true).await {
            Ok(raw) => match serde_json::from_str::<SuggestionReport>(&raw) {
                Ok(report) => {
                    if let Err(e) = self
                        .store
                        .save_site_suggestions(city, &report.sites)
                        .await
                    {
                        warn!(city, error = %e, "Failed to persist site suggestions");
                    }
                    to_candidates(report.sites)
                }
                Err(e) => {
                    warn!(city, error = %e, "Suggestion response did not match schema");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(city, error = %e, "Suggestion call failed");
                Vec::new()
            }
        }
    }
}

fn to_candidates(sites: Vec<SuggestedSite>) -> Vec<WebsiteCandidate> {
    sites
        .into_iter()
        .map(|site| WebsiteCandidate {
            url: site.url,
            source: "suggested".to_string(),
            interest: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateConfig;
    use crate::storage::MemoryEventStore;
    use crate::testing::MockBackend;

    fn service(backend: Arc<MockBackend>, store: Arc<MemoryEventStore>) -> SuggestionService {
        let gate = Arc::new(CompletionGate::new(backend, GateConfig::default()));
        SuggestionService::new(
            gate,
            store,
            "m".into(),
            Duration::from_secs(3 * 24 * 60 * 60),
            Duration::from_secs(600),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn caches_suggestions_durably() {
        let response = serde_json::json!({
            "sites": [{"url": "https://sf.example.com/calendar", "name": "SF Calendar"}]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));
        let store = Arc::new(MemoryEventStore::new());
        let service = service(backend.clone(), store.clone());

        let first = service.candidate_sites("San Francisco").await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].source, "suggested");
        assert_eq!(backend.calls(), 1);

        // Second run hits the durable cache: no new completion call.
        let second = service.candidate_sites("San Francisco").await;
        assert_eq!(second.len(), 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_call_contributes_nothing() {
        let backend = Arc::new(MockBackend::server_error("down"));
        let store = Arc::new(MemoryEventStore::new());
        let service = service(backend, store);

        assert!(service.candidate_sites("San Francisco").await.is_empty());
    }
}
