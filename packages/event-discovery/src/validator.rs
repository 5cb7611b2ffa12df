//! Batch validation and classification of unstructured candidate pages.
//!
//! One structured-output completion call per batch decides event-ness,
//! location validity, and category. Deterministic post-filters reject
//! boilerplate and out-of-town results no matter what the model said.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use openai_client::StructuredOutput;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FallbackPolicy;
use crate::gate::CompletionGate;
use crate::taxonomy;
use crate::traits::CompletionPayload;
use crate::types::{CandidatePage, DiscoveryRequest, EventSource, ExtractedEvent};

/// Titles longer than this are mis-extracted paragraph text, not titles.
pub const MAX_TITLE_LEN: usize = 120;

/// Navigation, legal, and auth boilerplate that is never an event title.
const BOILERPLATE_TITLES: &[&str] = &[
    "sign in",
    "log in",
    "login",
    "sign up",
    "register",
    "subscribe",
    "newsletter",
    "privacy policy",
    "terms of service",
    "terms and conditions",
    "cookie",
    "browse all",
    "view all",
    "see all",
    "all events",
    "events calendar",
    "search results",
    "page not found",
    "404",
    "my account",
    "about us",
    "contact us",
    "frequently asked",
];

/// Locations mentioning one of these (other than the target city) are
/// assumed to be elsewhere.
const MAJOR_CITIES: &[&str] = &[
    "new york",
    "los angeles",
    "chicago",
    "houston",
    "phoenix",
    "philadelphia",
    "san antonio",
    "san diego",
    "dallas",
    "san francisco",
    "austin",
    "seattle",
    "denver",
    "boston",
    "miami",
    "atlanta",
    "portland",
    "london",
    "paris",
    "berlin",
    "toronto",
];

const ONLINE_MARKERS: &[&str] = &["online", "virtual", "zoom", "livestream", "webinar", "remote"];

/// Completion-call response contract: one verdict per input URL.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub results: Vec<PageVerdict>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PageVerdict {
    pub url: String,
    pub is_event: bool,
    pub events: Vec<ClassifiedEvent>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClassifiedEvent {
    pub title: String,
    pub description: Option<String>,
    /// Calendar date, YYYY-MM-DD
    pub date: String,
    pub time: Option<String>,
    pub location: String,
    pub link: Option<String>,
    /// One of the closed taxonomy categories
    pub category: String,
}

pub struct Validator {
    gate: Arc<CompletionGate>,
    model: String,
    batch_size: usize,
    cache_ttl: Duration,
    fallback: FallbackPolicy,
}

impl Validator {
    pub fn new(
        gate: Arc<CompletionGate>,
        model: String,
        batch_size: usize,
        cache_ttl: Duration,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            gate,
            model,
            batch_size,
            cache_ttl,
            fallback,
        }
    }

    /// Validate a batch of candidate pages. Never errors: a failed or
    /// cooled-down completion call degrades through the fallback policy.
    pub async fn validate(
        &self,
        mut pages: Vec<CandidatePage>,
        request: &DiscoveryRequest,
    ) -> Vec<ExtractedEvent> {
        if pages.is_empty() {
            return Vec::new();
        }
        pages.truncate(self.batch_size);

        let payload = CompletionPayload::new(
            &self.model,
            validation_system_prompt(&request.city),
            validation_user_prompt(&pages),
            ValidationReport::openai_schema(),
        );

        // Fast-fail on cooldown: the fallback path is cheaper than
        // blocking the run's time budget.
        match self.gate.invoke(&payload, self.cache_ttl, true).await {
            Ok(raw) => match serde_json::from_str::<ValidationReport>(&raw) {
                Ok(report) => self.events_from_report(report, &pages, request),
                Err(e) => {
                    warn!(error = %e, "Validation response did not match schema");
                    self.fallback_events(pages, request)
                }
            },
            Err(e) => {
                warn!(error = %e, "Validation call failed");
                self.fallback_events(pages, request)
            }
        }
    }

    fn events_from_report(
        &self,
        report: ValidationReport,
        pages: &[CandidatePage],
        request: &DiscoveryRequest,
    ) -> Vec<ExtractedEvent> {
        let mut events = Vec::new();

        for verdict in report.results {
            if !verdict.is_event {
                continue;
            }
            // Only URLs we actually submitted may produce events.
            let Some(page) = pages.iter().find(|p| p.url == verdict.url) else {
                continue;
            };

            for classified in verdict.events {
                let Some(event) = accept_classified(classified, page, request) else {
                    continue;
                };
                events.push(event);
            }
        }

        debug!(count = events.len(), "Validation accepted events");
        events
    }

    /// Availability-over-precision fallback: emit candidates as
    /// low-confidence events with deterministic classification.
    fn fallback_events(
        &self,
        pages: Vec<CandidatePage>,
        request: &DiscoveryRequest,
    ) -> Vec<ExtractedEvent> {
        match self.fallback {
            FallbackPolicy::Drop => Vec::new(),
            FallbackPolicy::EmitRaw => pages
                .into_iter()
                .filter(|p| title_acceptable(&p.title))
                .map(|p| {
                    let text = format!("{} {}", p.title, p.description.as_deref().unwrap_or(""));
                    ExtractedEvent {
                        title: p.title,
                        description: p.description.unwrap_or_default(),
                        date: Utc::now().date_naive(),
                        time: crate::pages::TIME_UNKNOWN.to_string(),
                        location: request.city.clone(),
                        external_link: p.url,
                        image_url: None,
                        interests: taxonomy::classify_or_fallback(&text),
                        vibes: request.vibes.clone(),
                        source: EventSource::RawFallback,
                    }
                })
                .collect(),
        }
    }
}

/// Apply every deterministic filter to one classified event.
fn accept_classified(
    classified: ClassifiedEvent,
    page: &CandidatePage,
    request: &DiscoveryRequest,
) -> Option<ExtractedEvent> {
    let title = classified.title.trim().to_string();
    if !title_acceptable(&title) {
        return None;
    }
    let date = parse_event_date(&classified.date)?;
    if !location_acceptable(&classified.location, &request.city) {
        return None;
    }

    let link = classified
        .link
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| page.url.clone());

    let interests = match taxonomy::canonical_category(&classified.category) {
        Some(category) => vec![category.to_string()],
        None => taxonomy::classify_or_fallback(&title),
    };

    Some(ExtractedEvent {
        title,
        description: classified.description.unwrap_or_default(),
        date,
        time: classified
            .time
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| crate::pages::TIME_UNKNOWN.to_string()),
        location: classified.location,
        external_link: link,
        image_url: None,
        interests,
        vibes: request.vibes.clone(),
        source: EventSource::Validated,
    })
}

/// Reject empty, over-long, and boilerplate titles.
pub fn title_acceptable(title: &str) -> bool {
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_TITLE_LEN {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !BOILERPLATE_TITLES.iter().any(|b| lower.contains(b))
}

/// Accept only target-city or online/virtual locations, and never a
/// location naming a different major city.
pub fn location_acceptable(location: &str, city: &str) -> bool {
    let loc = location.trim().to_lowercase();
    if loc.is_empty() {
        return false;
    }
    let city = city.trim().to_lowercase();

    let in_city = loc.contains(&city);
    let online = ONLINE_MARKERS.iter().any(|m| loc.contains(m));
    if !in_city && !online {
        return false;
    }

    let mentions_other_city = MAJOR_CITIES
        .iter()
        .filter(|c| **c != city)
        .any(|c| loc.contains(c));
    !mentions_other_city
}

/// Parse the date formats the classifier and structured markup emit.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in ["%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

fn validation_system_prompt(city: &str) -> String {
    format!(
        "You review scraped web pages and decide whether each describes a real, \
         dated, in-person or online event in or near {city}. For every input URL \
         return is_event and, when true, one record per distinct event with a \
         category chosen strictly from this list: {categories}. Dates must be \
         YYYY-MM-DD. Never invent events for pages that do not describe one.",
        city = city,
        categories = taxonomy::CATEGORIES.join(", "),
    )
}

fn validation_user_prompt(pages: &[CandidatePage]) -> String {
    let mut prompt = String::from("Candidate pages:\n");
    for page in pages {
        prompt.push_str(&format!(
            "- url: {}\n  title: {}\n  description: {}\n",
            page.url,
            page.title,
            page.description.as_deref().unwrap_or("(none)"),
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateConfig;
    use crate::testing::MockBackend;
    use crate::types::DiscoveryRequest;

    fn request() -> DiscoveryRequest {
        DiscoveryRequest::new("San Francisco", vec!["Yoga".into()])
    }

    fn candidate(url: &str, title: &str) -> CandidatePage {
        CandidatePage {
            url: url.to_string(),
            title: title.to_string(),
            description: None,
        }
    }

    fn validator(backend: Arc<MockBackend>, fallback: FallbackPolicy) -> Validator {
        let gate = Arc::new(CompletionGate::new(backend, GateConfig::default()));
        Validator::new(gate, "m".into(), 30, Duration::from_secs(600), fallback)
    }

    #[test]
    fn boilerplate_titles_are_rejected() {
        assert!(!title_acceptable("Sign in to view events"));
        assert!(!title_acceptable("Privacy Policy"));
        assert!(!title_acceptable(""));
        assert!(!title_acceptable(&"x".repeat(200)));
        assert!(title_acceptable("Sunrise Yoga at the Pier"));
    }

    #[test]
    fn location_filter_accepts_city_and_online_only() {
        assert!(location_acceptable("Mission District, San Francisco", "San Francisco"));
        assert!(location_acceptable("Online via Zoom", "San Francisco"));
        assert!(!location_acceptable("Madison Square Garden, New York", "San Francisco"));
        assert!(!location_acceptable("Golden Gate Park", "San Francisco"));
        // City present but another major city named too: elsewhere.
        assert!(!location_acceptable("San Francisco and Chicago tour", "San Francisco"));
    }

    #[test]
    fn event_dates_parse_common_formats() {
        assert!(parse_event_date("2026-08-08").is_some());
        assert!(parse_event_date("2026-08-08T19:00:00-07:00").is_some());
        assert!(parse_event_date("08/08/2026").is_some());
        assert!(parse_event_date("August 8, 2026").is_some());
        assert!(parse_event_date("sometime soon").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_events_come_back_classified() {
        let response = serde_json::json!({
            "results": [{
                "url": "https://sf.example.com/yoga",
                "is_event": true,
                "events": [{
                    "title": "Sunset Yoga",
                    "description": "Outdoor flow",
                    "date": "2026-08-08",
                    "time": "6:00 PM",
                    "location": "San Francisco",
                    "link": "https://sf.example.com/yoga",
                    "category": "Yoga"
                }]
            }]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));
        let validator = validator(backend, FallbackPolicy::EmitRaw);

        let events = validator
            .validate(vec![candidate("https://sf.example.com/yoga", "Sunset Yoga")], &request())
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].interests, vec!["Yoga".to_string()]);
        assert_eq!(events[0].source, EventSource::Validated);
    }

    #[tokio::test(start_paused = true)]
    async fn boilerplate_survives_no_model_verdict() {
        // Even if the model calls it an event, the denylist wins.
        let response = serde_json::json!({
            "results": [{
                "url": "https://sf.example.com/auth",
                "is_event": true,
                "events": [{
                    "title": "Sign in to view events",
                    "description": null,
                    "date": "2026-08-08",
                    "time": null,
                    "location": "San Francisco",
                    "link": null,
                    "category": "Community"
                }]
            }]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));
        let validator = validator(backend, FallbackPolicy::EmitRaw);

        let events = validator
            .validate(
                vec![candidate("https://sf.example.com/auth", "Sign in to view events")],
                &request(),
            )
            .await;

        assert!(events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_town_events_are_rejected() {
        let response = serde_json::json!({
            "results": [{
                "url": "https://sf.example.com/road-trip",
                "is_event": true,
                "events": [{
                    "title": "Warehouse Party",
                    "description": null,
                    "date": "2026-08-08",
                    "time": null,
                    "location": "Brooklyn, New York",
                    "link": null,
                    "category": "Nightlife"
                }]
            }]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));
        let validator = validator(backend, FallbackPolicy::EmitRaw);

        let events = validator
            .validate(
                vec![candidate("https://sf.example.com/road-trip", "Warehouse Party")],
                &request(),
            )
            .await;

        assert!(events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hallucinated_urls_are_ignored() {
        let response = serde_json::json!({
            "results": [{
                "url": "https://nowhere.example.com/invented",
                "is_event": true,
                "events": [{
                    "title": "Invented Event",
                    "description": null,
                    "date": "2026-08-08",
                    "time": null,
                    "location": "San Francisco",
                    "link": null,
                    "category": "Community"
                }]
            }]
        });
        let backend = Arc::new(MockBackend::ok(&response.to_string()));
        let validator = validator(backend, FallbackPolicy::EmitRaw);

        let events = validator
            .validate(vec![candidate("https://sf.example.com/real", "Real Page")], &request())
            .await;

        assert!(events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn call_failure_emits_raw_fallback() {
        let backend = Arc::new(MockBackend::server_error("down"));
        let validator = validator(backend, FallbackPolicy::EmitRaw);

        let events = validator
            .validate(
                vec![
                    candidate("https://sf.example.com/yoga", "Morning Yoga Flow"),
                    candidate("https://sf.example.com/auth", "Sign in to view events"),
                ],
                &request(),
            )
            .await;

        // Boilerplate is still filtered on the fallback path.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, EventSource::RawFallback);
        assert_eq!(events[0].location, "San Francisco");
        assert!(events[0].interests.contains(&"Yoga".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_policy_discards_on_failure() {
        let backend = Arc::new(MockBackend::server_error("down"));
        let validator = validator(backend, FallbackPolicy::Drop);

        let events = validator
            .validate(vec![candidate("https://sf.example.com/yoga", "Morning Yoga")], &request())
            .await;

        assert!(events.is_empty());
    }
}
