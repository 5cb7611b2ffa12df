//! Deduplication, ranking, and final ordering of the combined event set.
//!
//! When enough events already exist (or time/permission is lacking) the
//! expensive comprehensive ranking call is skipped in favor of a
//! deterministic dedup + date sort.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use openai_client::StructuredOutput;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::gate::CompletionGate;
use crate::taxonomy;
use crate::traits::CompletionPayload;
use crate::types::{CanonicalKey, DiscoveryRequest, ExtractedEvent};
use crate::validator::{location_acceptable, parse_event_date, title_acceptable};

/// Ranking-call response contract: the ordered, re-validated event list.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RankingReport {
    pub events: Vec<RankedEvent>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RankedEvent {
    pub title: String,
    /// Calendar date, YYYY-MM-DD
    pub date: String,
    pub location: String,
    /// One of the closed taxonomy categories
    pub category: String,
}

pub struct Consolidator {
    gate: Arc<CompletionGate>,
    model: String,
    skip_threshold: usize,
    max_events: usize,
    cache_ttl: Duration,
}

impl Consolidator {
    pub fn new(
        gate: Arc<CompletionGate>,
        model: String,
        skip_threshold: usize,
        max_events: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            gate,
            model,
            skip_threshold,
            max_events,
            cache_ttl,
        }
    }

    /// Consolidate the combined event set. Never errors; every failure
    /// path degrades to the deterministic dedup + sort.
    pub async fn consolidate(
        &self,
        events: Vec<ExtractedEvent>,
        request: &DiscoveryRequest,
        remaining_budget: Duration,
        ranking_reserve: Duration,
    ) -> Vec<ExtractedEvent> {
        if events.is_empty() {
            return events;
        }

        if request.limits.skip_ranking {
            debug!("Ranking skipped by request");
            return self.dedup_sort_cap(events);
        }
        if events.len() >= self.skip_threshold {
            debug!(count = events.len(), "Enough events, skipping ranking call");
            return self.dedup_sort_cap(events);
        }
        if remaining_budget < ranking_reserve {
            debug!(
                remaining_ms = remaining_budget.as_millis() as u64,
                "Not enough budget left to rank"
            );
            return self.dedup_sort_cap(events);
        }

        let deduped = self.dedup_sort_cap(events);
        let payload = CompletionPayload::new(
            &self.model,
            ranking_system_prompt(&request.city, &request.interests),
            ranking_user_prompt(&deduped),
            RankingReport::openai_schema(),
        );

        match self.gate.invoke(&payload, self.cache_ttl, true).await {
            Ok(raw) => match serde_json::from_str::<RankingReport>(&raw) {
                Ok(report) => self.apply_ranking(report, deduped, request),
                Err(e) => {
                    warn!(error = %e, "Ranking response did not match schema");
                    deduped
                }
            },
            Err(e) => {
                warn!(error = %e, "Ranking call failed");
                deduped
            }
        }
    }

    /// Map the ranked output back onto the events we actually hold, in
    /// ranked order. Entries that match nothing we extracted are model
    /// inventions and are dropped.
    fn apply_ranking(
        &self,
        report: RankingReport,
        events: Vec<ExtractedEvent>,
        request: &DiscoveryRequest,
    ) -> Vec<ExtractedEvent> {
        let comedy_requested = request
            .interests
            .iter()
            .any(|i| i.eq_ignore_ascii_case(taxonomy::SENSITIVE_CATEGORY));

        let mut by_key: HashMap<CanonicalKey, ExtractedEvent> = events
            .into_iter()
            .map(|e| (e.canonical_key(), e))
            .collect();

        let mut ranked = Vec::new();
        for entry in report.events {
            let Some(date) = parse_event_date(&entry.date) else {
                continue;
            };
            let key = CanonicalKey::new(&entry.title, date, &entry.location);
            let Some(mut event) = by_key.remove(&key) else {
                continue;
            };

            if !title_acceptable(&event.title) {
                continue;
            }
            if !location_acceptable(&event.location, &request.city) {
                continue;
            }
            if let Some(category) = taxonomy::canonical_category(&entry.category) {
                event.interests = vec![category.to_string()];
            }
            // Sensitive category: only surfaced when explicitly asked for.
            if event
                .interests
                .iter()
                .any(|i| i == taxonomy::SENSITIVE_CATEGORY)
                && !comedy_requested
            {
                continue;
            }

            ranked.push(event);
            if ranked.len() >= self.max_events {
                break;
            }
        }

        debug!(count = ranked.len(), "Ranking applied");
        ranked
    }

    /// The deterministic path: dedup by canonical key (first occurrence
    /// wins, so structured extractions beat later duplicates), sort by
    /// date ascending, cap.
    fn dedup_sort_cap(&self, events: Vec<ExtractedEvent>) -> Vec<ExtractedEvent> {
        let mut seen = HashMap::new();
        let mut unique = Vec::new();
        for event in events {
            let key = event.canonical_key();
            if seen.insert(key, ()).is_none() {
                unique.push(event);
            }
        }
        unique.sort_by(|a, b| a.date.cmp(&b.date));
        unique.truncate(self.max_events);
        unique
    }
}

fn ranking_system_prompt(city: &str, interests: &[String]) -> String {
    format!(
        "You rank candidate events for someone in {city} interested in: \
         {interests}. Re-check that each entry is a real dated event in or \
         near {city}, re-classify its category strictly from this list: \
         {categories}, and return the events ordered by relevance and date \
         proximity. Omit entries that are not real events.",
        city = city,
        interests = interests.join(", "),
        categories = taxonomy::CATEGORIES.join(", "),
    )
}

fn ranking_user_prompt(events: &[ExtractedEvent]) -> String {
    let mut prompt = String::from("Candidate events:\n");
    for event in events {
        prompt.push_str(&format!(
            "- title: {}\n  date: {}\n  location: {}\n  category: {}\n",
            event.title,
            event.date,
            event.location,
            event.interests.first().map(String::as_str).unwrap_or(""),
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateConfig;
    use crate::testing::MockBackend;
    use crate::types::EventSource;
    use chrono::NaiveDate;

    fn event(title: &str, date: &str, location: &str) -> ExtractedEvent {
        ExtractedEvent {
            title: title.to_string(),
            description: String::new(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: "7:00 PM".to_string(),
            location: location.to_string(),
            external_link: format!("https://x.example.com/{}", title.replace(' ', "-")),
            image_url: None,
            interests: vec!["Music".to_string()],
            vibes: Vec::new(),
            source: EventSource::Structured,
        }
    }

    fn consolidator(backend: Arc<MockBackend>) -> Consolidator {
        let gate = Arc::new(CompletionGate::new(backend, GateConfig::default()));
        Consolidator::new(gate, "m".into(), 100, 60, Duration::from_secs(600))
    }

    fn request() -> DiscoveryRequest {
        DiscoveryRequest::new("San Francisco", vec!["Music".into()])
    }

    #[tokio::test(start_paused = true)]
    async fn skip_threshold_avoids_the_gate_entirely() {
        let backend = Arc::new(MockBackend::ok("{}"));
        let gate = Arc::new(CompletionGate::new(backend.clone(), GateConfig::default()));
        let consolidator = Consolidator::new(gate, "m".into(), 3, 60, Duration::from_secs(600));

        let events = vec![
            event("A", "2026-08-10", "San Francisco"),
            event("B", "2026-08-09", "San Francisco"),
            event("A", "2026-08-10", "san francisco"), // dup by canonical key
            event("C", "2026-08-11", "San Francisco"),
        ];

        let out = consolidator
            .consolidate(events, &request(), Duration::from_secs(20), Duration::from_secs(5))
            .await;

        assert_eq!(backend.calls(), 0);
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn low_budget_skips_ranking() {
        let backend = Arc::new(MockBackend::ok("{}"));
        let consolidator = consolidator(backend.clone());

        let out = consolidator
            .consolidate(
                vec![event("A", "2026-08-10", "San Francisco")],
                &request(),
                Duration::from_secs(2),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(backend.calls(), 0);
        assert_eq!(out.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ranking_orders_and_reclassifies() {
        let response = serde_json::json!({
            "events": [
                {"title": "B", "date": "2026-08-09", "location": "San Francisco", "category": "Nightlife"},
                {"title": "A", "date": "2026-08-10", "location": "San Francisco", "category": "Music"},
                {"title": "Ghost", "date": "2026-08-12", "location": "San Francisco", "category": "Music"}
            ]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));
        let consolidator = consolidator(backend.clone());

        let out = consolidator
            .consolidate(
                vec![
                    event("A", "2026-08-10", "San Francisco"),
                    event("B", "2026-08-09", "San Francisco"),
                ],
                &request(),
                Duration::from_secs(20),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(backend.calls(), 1);
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        // Ranked order preserved; the invented "Ghost" entry is dropped.
        assert_eq!(titles, vec!["B", "A"]);
        assert_eq!(out[0].interests, vec!["Nightlife".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn comedy_dropped_unless_requested() {
        let response = serde_json::json!({
            "events": [
                {"title": "Open Mic Comedy", "date": "2026-08-09", "location": "San Francisco", "category": "Comedy"},
                {"title": "A", "date": "2026-08-10", "location": "San Francisco", "category": "Music"}
            ]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));

        let events = || {
            vec![
                event("Open Mic Comedy", "2026-08-09", "San Francisco"),
                event("A", "2026-08-10", "San Francisco"),
            ]
        };

        let out = consolidator(backend.clone())
            .consolidate(events(), &request(), Duration::from_secs(20), Duration::from_secs(5))
            .await;
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A"]);

        let comedy_request =
            DiscoveryRequest::new("San Francisco", vec!["Comedy".into(), "Music".into()]);
        let out = consolidator(backend)
            .consolidate(events(), &comedy_request, Duration::from_secs(20), Duration::from_secs(5))
            .await;
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Open Mic Comedy", "A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ranking_failure_falls_back_to_sorted_dedup() {
        let backend = Arc::new(MockBackend::server_error("down"));
        let consolidator = consolidator(backend);

        let out = consolidator
            .consolidate(
                vec![
                    event("A", "2026-08-10", "San Francisco"),
                    event("B", "2026-08-09", "San Francisco"),
                ],
                &request(),
                Duration::from_secs(20),
                Duration::from_secs(5),
            )
            .await;

        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }
}
