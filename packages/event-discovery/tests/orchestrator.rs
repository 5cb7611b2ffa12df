//! End-to-end pipeline tests over deterministic fakes.
//!
//! Every external collaborator is mocked; time is paused so budget and
//! pacing behavior is exact.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use event_discovery::storage::MemoryEventStore;
use event_discovery::testing::{MockBackend, MockFetcher, MockSearch};
use event_discovery::{
    DiscoveryLimits, DiscoveryRequest, EventStore, GateConfig, Orchestrator, PipelineConfig,
    ProgressStep,
};
use tokio::time::Instant;

const LISTING_URL: &str = "https://sfyoga.example.com/classes";
const EVENT_URL: &str = "https://sfyoga.example.com/events/sunrise-yoga";

fn listing_html() -> String {
    r#"<html><body>
        <a href="/events/sunrise-yoga">Sunrise Yoga</a>
        <a href="/login">Sign in</a>
    </body></html>"#
        .to_string()
}

fn event_html(date: &str) -> String {
    format!(
        r#"<html><head><title>Sunrise Yoga</title></head><body>
        <script type="application/ld+json">
        {{
            "@type": "Event",
            "name": "Sunrise Yoga",
            "startDate": "{date}T07:00:00-07:00",
            "location": {{"@type": "Place", "name": "Crissy Field",
                         "address": {{"addressLocality": "San Francisco"}}}},
            "description": "Morning yoga flow by the bay.",
            "url": "{EVENT_URL}"
        }}
        </script></body></html>"#
    )
}

fn tomorrow() -> String {
    (Utc::now().date_naive() + Days::new(1)).to_string()
}

fn request() -> DiscoveryRequest {
    DiscoveryRequest::new("San Francisco", vec!["Yoga".to_string()]).with_limits(
        DiscoveryLimits {
            skip_ranking: true,
            ..DiscoveryLimits::default()
        },
    )
}

struct Harness {
    orchestrator: Orchestrator,
    backend: Arc<MockBackend>,
    fetcher: Arc<MockFetcher>,
    store: Arc<MemoryEventStore>,
}

fn harness(search: MockSearch, fetcher: MockFetcher, backend: MockBackend) -> Harness {
    let backend = Arc::new(backend);
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(MemoryEventStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(search),
        fetcher.clone(),
        backend.clone(),
        store.clone(),
        PipelineConfig::default(),
        GateConfig::default(),
    );
    Harness {
        orchestrator,
        backend,
        fetcher,
        store,
    }
}

/// Scenario A: one structured yoga event tomorrow in San Francisco.
#[tokio::test(start_paused = true)]
async fn structured_yoga_event_is_discovered() {
    let search = MockSearch::new().with_any(&[LISTING_URL]);
    let fetcher = MockFetcher::new()
        .with_page(LISTING_URL, &listing_html())
        .with_page(EVENT_URL, &event_html(&tomorrow()));
    let backend = MockBackend::ok(r#"{"sites": []}"#);

    let h = harness(search, fetcher, backend);
    let response = h.orchestrator.discover(request()).await.unwrap();

    assert_eq!(response.events.len(), 1);
    let event = &response.events[0];
    assert_eq!(event.title, "Sunrise Yoga");
    assert!(event.interests.contains(&"Yoga".to_string()));
    assert_eq!(event.time, "7:00 AM");

    // The listing scrape succeeded and was reported.
    assert_eq!(response.scraping_status.len(), 1);
    assert_eq!(response.scraping_status[0].url, LISTING_URL);

    // Survivors were persisted.
    assert_eq!(h.store.event_count(), 1);
    assert_eq!(h.orchestrator.progress().snapshot().step, ProgressStep::Done);
}

/// Scenario B: an identical request within the cache TTL is a sub-second
/// fast path returning the same events.
#[tokio::test(start_paused = true)]
async fn repeated_request_hits_the_result_cache() {
    let search = MockSearch::new().with_any(&[LISTING_URL]);
    let fetcher = MockFetcher::new()
        .with_page(LISTING_URL, &listing_html())
        .with_page(EVENT_URL, &event_html(&tomorrow()));
    let backend = MockBackend::ok(r#"{"sites": []}"#);

    let h = harness(search, fetcher, backend);
    let first = h.orchestrator.discover(request()).await.unwrap();

    let fetches_after_first = h.fetcher.fetched().len();
    let calls_after_first = h.backend.calls();

    let started = Instant::now();
    let second = h.orchestrator.discover(request()).await.unwrap();
    let elapsed = started.elapsed();

    // No new fetches or completion calls, and no time spent waiting.
    assert_eq!(h.fetcher.fetched().len(), fetches_after_first);
    assert_eq!(h.backend.calls(), calls_after_first);
    assert!(elapsed < Duration::from_secs(1), "cache hit took {elapsed:?}");

    let keys = |events: &[event_discovery::ExtractedEvent]| -> BTreeSet<String> {
        events.iter().map(|e| e.canonical_key().to_string()).collect()
    };
    assert_eq!(keys(&first.events), keys(&second.events));
}

/// Scenario C: auth boilerplate is excluded even when the completion API
/// claims it is an event.
#[tokio::test(start_paused = true)]
async fn boilerplate_title_never_survives() {
    let auth_url = "https://sfyoga.example.com/events/members";
    let listing = r#"<html><body><a href="/events/members">Members</a></body></html>"#;
    let auth_page = r#"<html><head><title>Sign in to view events</title></head><body></body></html>"#;

    let verdict = serde_json::json!({
        "results": [{
            "url": auth_url,
            "is_event": true,
            "events": [{
                "title": "Sign in to view events",
                "description": null,
                "date": tomorrow(),
                "time": null,
                "location": "San Francisco",
                "link": null,
                "category": "Community"
            }]
        }]
    });

    let search = MockSearch::new().with_any(&[LISTING_URL]);
    let fetcher = MockFetcher::new()
        .with_page(LISTING_URL, listing)
        .with_page(auth_url, auth_page);
    let backend = MockBackend::ok(r#"{"sites": []}"#)
        .with_rule("review scraped web pages", &verdict.to_string());

    let h = harness(search, fetcher, backend);
    let response = h.orchestrator.discover(request()).await.unwrap();

    assert!(response.events.is_empty());
    assert_eq!(h.store.event_count(), 0);
}

/// Scenario D: rediscovery after a store clear reproduces the same
/// canonical key set under fresh storage ids.
#[tokio::test(start_paused = true)]
async fn rediscovery_is_canonical_key_stable() {
    let date = tomorrow();
    let build = || {
        (
            MockSearch::new().with_any(&[LISTING_URL]),
            MockFetcher::new()
                .with_page(LISTING_URL, &listing_html())
                .with_page(EVENT_URL, &event_html(&date)),
            MockBackend::ok(r#"{"sites": []}"#),
        )
    };

    let store = Arc::new(MemoryEventStore::new());

    let (search, fetcher, backend) = build();
    let first_orchestrator = Orchestrator::new(
        Arc::new(search),
        Arc::new(fetcher),
        Arc::new(backend),
        store.clone(),
        PipelineConfig::default(),
        GateConfig::default(),
    );
    first_orchestrator.discover(request()).await.unwrap();
    let first_rows = store.list_events().await.unwrap();

    store.clear_events().await.unwrap();

    // Fresh orchestrator: no result cache, no visited ledger carryover.
    let (search, fetcher, backend) = build();
    let second_orchestrator = Orchestrator::new(
        Arc::new(search),
        Arc::new(fetcher),
        Arc::new(backend),
        store.clone(),
        PipelineConfig::default(),
        GateConfig::default(),
    );
    second_orchestrator.discover(request()).await.unwrap();
    let second_rows = store.list_events().await.unwrap();

    let first_keys: BTreeSet<&str> =
        first_rows.iter().map(|r| r.canonical_key.as_str()).collect();
    let second_keys: BTreeSet<&str> =
        second_rows.iter().map(|r| r.canonical_key.as_str()).collect();
    assert_eq!(first_keys, second_keys);
    assert!(!first_keys.is_empty());

    let first_ids: BTreeSet<_> = first_rows.iter().map(|r| r.id).collect();
    let second_ids: BTreeSet<_> = second_rows.iter().map(|r| r.id).collect();
    assert!(first_ids.is_disjoint(&second_ids));
}

/// The run never exceeds its budget by more than one in-flight fetch's
/// own timeout.
#[tokio::test(start_paused = true)]
async fn budget_overrun_is_bounded_by_one_fetch() {
    let slow_sites: Vec<String> = (0..10)
        .map(|i| format!("https://slow{i}.example.com/cal"))
        .collect();
    let slow_refs: Vec<&str> = slow_sites.iter().map(String::as_str).collect();

    let mut fetcher = MockFetcher::new().with_latency(Duration::from_secs(10));
    for site in &slow_sites {
        fetcher = fetcher.with_page(site, "<html></html>");
    }

    let search = MockSearch::new().with_any(&slow_refs);
    let backend = MockBackend::ok(r#"{"sites": []}"#);
    let h = harness(search, fetcher, backend);

    let mut req = request();
    req.limits.time_budget = Duration::from_secs(5);
    req.limits.max_sites = 10;

    let config = PipelineConfig::default();
    let started = Instant::now();
    let response = h.orchestrator.discover(req).await.unwrap();
    let elapsed = started.elapsed();

    assert!(response.events.is_empty());
    assert!(
        elapsed <= Duration::from_secs(5) + config.listing_timeout + Duration::from_secs(1),
        "run took {elapsed:?}"
    );
    // The first listing fetch was in flight when the budget expired; no
    // further fetch may start.
    assert_eq!(h.fetcher.fetched().len(), 1);
}

/// Page fetches run at the configured pool width.
#[tokio::test(start_paused = true)]
async fn page_fetch_pool_is_bounded() {
    let links: Vec<String> = (0..8)
        .map(|i| format!("https://venue.example.com/events/e{i}"))
        .collect();
    let listing: String = links
        .iter()
        .map(|l| format!(r#"<a href="{l}">e</a>"#))
        .collect();

    let mut fetcher = MockFetcher::new()
        .with_page(LISTING_URL, &listing)
        .with_latency(Duration::from_secs(1));
    for link in &links {
        fetcher = fetcher.with_page(link, &event_html(&tomorrow()));
    }

    let search = MockSearch::new().with_any(&[LISTING_URL]);
    let backend = MockBackend::ok(r#"{"sites": []}"#);
    let h = harness(search, fetcher, backend);

    let started = Instant::now();
    h.orchestrator.discover(request()).await.unwrap();
    let elapsed = started.elapsed();

    // 1 listing fetch + 8 page fetches at width 4: at least three
    // 1-second waves of fetch latency must have elapsed.
    assert!(elapsed >= Duration::from_secs(3), "run took {elapsed:?}");
    assert_eq!(h.fetcher.fetched().len(), 9);
}
