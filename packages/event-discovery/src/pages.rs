//! Page extractor: one candidate URL in, structured events or a
//! classification candidate out.
//!
//! Tries embedded schema.org JSON-LD first; structured hits are
//! classified by the deterministic keyword table so they never spend a
//! completion call. Pages without structured data become
//! [`CandidatePage`]s when they have a plausible title.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;
use crate::taxonomy;
use crate::traits::PageFetcher;
use crate::types::{CandidatePage, EventSource, ExtractedEvent};
use crate::visited::VisitedLedger;

/// Time string used when a page names a date but no time.
pub const TIME_UNKNOWN: &str = "See website";

/// What one page yielded.
#[derive(Debug)]
pub enum PageOutcome {
    Structured(Vec<ExtractedEvent>),
    Candidate(CandidatePage),
    Nothing,
}

#[derive(Clone)]
pub struct PageExtractor {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl PageExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch and extract a single page.
    pub async fn extract(&self, url: &str, vibes: &[String]) -> Result<PageOutcome> {
        let page = self.fetcher.fetch(url, self.timeout).await?;

        let events = parse_structured_events(&page.html, &page.url, vibes);
        if !events.is_empty() {
            debug!(url, count = events.len(), "Structured event data found");
            return Ok(PageOutcome::Structured(events));
        }

        match page_title(&page.html) {
            Some(title) if title.len() > 3 => Ok(PageOutcome::Candidate(CandidatePage {
                url: page.url,
                title,
                description: meta_description(&page.html),
            })),
            _ => Ok(PageOutcome::Nothing),
        }
    }

    /// Extract a batch of links under a bounded worker pool, recording
    /// every attempt in the visited ledger. Stops launching new fetches
    /// once `deadline` passes; in-flight fetches are allowed to finish.
    pub async fn extract_batch(
        &self,
        links: Vec<String>,
        vibes: &[String],
        concurrency: usize,
        deadline: Instant,
        ledger: &VisitedLedger,
    ) -> (Vec<ExtractedEvent>, Vec<CandidatePage>) {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks: JoinSet<(String, Result<PageOutcome>)> = JoinSet::new();

        for url in links {
            if Instant::now() >= deadline {
                debug!("Time budget reached, truncating page extraction");
                break;
            }
            if ledger.should_skip(&url) {
                debug!(url = %url, "Skipping recently visited URL");
                continue;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            // The permit may have taken a while; don't start late work.
            if Instant::now() >= deadline {
                break;
            }
            let extractor = self.clone();
            let vibes = vibes.to_vec();
            tasks.spawn(async move {
                let outcome = extractor.extract(&url, &vibes).await;
                drop(permit);
                (url, outcome)
            });
        }

        let mut events = Vec::new();
        let mut candidates = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let Ok((url, outcome)) = joined else {
                continue;
            };
            match outcome {
                Ok(PageOutcome::Structured(found)) => {
                    ledger.record(&url, true);
                    events.extend(found);
                }
                Ok(PageOutcome::Candidate(page)) => {
                    ledger.record(&url, false);
                    candidates.push(page);
                }
                Ok(PageOutcome::Nothing) => {
                    ledger.record(&url, false);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Event page fetch failed");
                    ledger.record(&url, false);
                }
            }
        }

        (events, candidates)
    }
}

fn ld_json_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
            .unwrap()
    })
}

/// Parse every schema.org Event node embedded in the page.
pub fn parse_structured_events(html: &str, page_url: &str, vibes: &[String]) -> Vec<ExtractedEvent> {
    let mut events = Vec::new();

    for block in ld_json_pattern().captures_iter(html) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(block[1].trim()) else {
            continue;
        };
        for node in event_nodes(&value) {
            if let Some(event) = event_from_node(node, page_url, vibes) {
                events.push(event);
            }
        }
    }

    events
}

/// Flatten top-level objects, arrays, and `@graph` containers into the
/// Event-typed nodes they hold.
fn event_nodes(value: &serde_json::Value) -> Vec<&serde_json::Value> {
    let mut nodes = Vec::new();
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                nodes.extend(event_nodes(item));
            }
        }
        serde_json::Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                nodes.extend(event_nodes(graph));
            }
            if is_event_type(map.get("@type")) {
                nodes.push(value);
            }
        }
        _ => {}
    }
    nodes
}

/// `@type` may be a string ("Event", "MusicEvent") or an array of them.
fn is_event_type(type_field: Option<&serde_json::Value>) -> bool {
    match type_field {
        Some(serde_json::Value::String(s)) => s.ends_with("Event"),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .any(|v| v.as_str().is_some_and(|s| s.ends_with("Event"))),
        _ => false,
    }
}

fn event_from_node(
    node: &serde_json::Value,
    page_url: &str,
    vibes: &[String],
) -> Option<ExtractedEvent> {
    let title = decode_entities(node.get("name")?.as_str()?.trim());
    if title.is_empty() {
        return None;
    }

    let start = node.get("startDate")?.as_str()?;
    let (date, time) = parse_start_date(start)?;

    let description = node
        .get("description")
        .and_then(|d| d.as_str())
        .map(|d| decode_entities(d.trim()))
        .unwrap_or_default();

    let location = location_text(node.get("location"));
    let link = node
        .get("url")
        .and_then(|u| u.as_str())
        .unwrap_or(page_url)
        .to_string();
    let image_url = image_text(node.get("image"));

    let interests = taxonomy::classify_or_fallback(&format!("{} {}", title, description));

    Some(ExtractedEvent {
        title,
        description,
        date,
        time,
        location,
        external_link: link,
        image_url,
        interests,
        vibes: vibes.to_vec(),
        source: EventSource::Structured,
    })
}

/// schema.org location: a string, a Place with a `name`, or a Place with
/// a postal address.
fn location_text(location: Option<&serde_json::Value>) -> String {
    match location {
        Some(serde_json::Value::String(s)) => decode_entities(s.trim()),
        Some(serde_json::Value::Object(map)) => {
            let name = map.get("name").and_then(|n| n.as_str()).unwrap_or("");
            let locality = map
                .get("address")
                .map(|a| match a {
                    serde_json::Value::String(s) => s.as_str(),
                    serde_json::Value::Object(addr) => addr
                        .get("addressLocality")
                        .and_then(|l| l.as_str())
                        .unwrap_or(""),
                    _ => "",
                })
                .unwrap_or("");
            let combined = match (name.is_empty(), locality.is_empty()) {
                (false, false) => format!("{}, {}", name, locality),
                (false, true) => name.to_string(),
                (true, false) => locality.to_string(),
                (true, true) => String::new(),
            };
            decode_entities(&combined)
        }
        Some(serde_json::Value::Array(items)) => items
            .first()
            .map(|first| location_text(Some(first)))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// schema.org image: a string, an array, or an ImageObject.
fn image_text(image: Option<&serde_json::Value>) -> Option<String> {
    match image {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => items.first().and_then(|i| image_text(Some(i))),
        Some(serde_json::Value::Object(map)) => {
            map.get("url").and_then(|u| u.as_str()).map(String::from)
        }
        _ => None,
    }
}

/// Normalize a startDate string to calendar date + 12-hour time.
pub fn parse_start_date(raw: &str) -> Option<(NaiveDate, String)> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.date_naive(), format_12h(dt.time())));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some((dt.date(), format_12h(dt.time())));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some((dt.date(), format_12h(dt.time())));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some((date, TIME_UNKNOWN.to_string()));
    }

    None
}

/// "19:30" → "7:30 PM"
fn format_12h(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        time.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap())
}

fn og_title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]*property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']+)["']"#)
            .unwrap()
    })
}

fn meta_description_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']+)["']"#)
            .unwrap()
    })
}

/// Best-effort page title: og:title, then <title>.
pub fn page_title(html: &str) -> Option<String> {
    let raw = og_title_pattern()
        .captures(html)
        .map(|c| c[1].to_string())
        .or_else(|| title_pattern().captures(html).map(|c| c[1].to_string()))?;
    let title = decode_entities(raw.trim());
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

pub fn meta_description(html: &str) -> Option<String> {
    meta_description_pattern()
        .captures(html)
        .map(|c| decode_entities(c[1].trim()))
        .filter(|d| !d.is_empty())
}

/// Decode the HTML entities that actually show up in event markup.
pub fn decode_entities(text: &str) -> String {
    let mut out = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");

    // Numeric references: &#233; and &#x2019;
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let pattern = NUMERIC.get_or_init(|| Regex::new(r"&#(x?)([0-9a-fA-F]+);").unwrap());
    while let Some(caps) = pattern.captures(&out) {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        let replacement = u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default();
        out = out.replacen(&caps[0], &replacement, 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_PAGE: &str = r#"
        <html><head><title>Jazz Night | Venue</title></head><body>
        <script type="application/ld+json">
        {
            "@context": "https://schema.org",
            "@type": "MusicEvent",
            "name": "Jazz Night &amp; Jam Session",
            "startDate": "2026-09-12T19:30:00-07:00",
            "location": {
                "@type": "Place",
                "name": "Blue Door",
                "address": {"addressLocality": "San Francisco"}
            },
            "description": "An evening of live jazz.",
            "url": "https://venue.example.com/events/jazz-night",
            "image": "https://venue.example.com/jazz.jpg"
        }
        </script></body></html>
    "#;

    #[test]
    fn parses_a_single_event_node() {
        let events = parse_structured_events(EVENT_PAGE, "https://venue.example.com/p", &[]);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.title, "Jazz Night & Jam Session");
        assert_eq!(event.date.to_string(), "2026-09-12");
        assert_eq!(event.time, "7:30 PM");
        assert_eq!(event.location, "Blue Door, San Francisco");
        assert_eq!(event.external_link, "https://venue.example.com/events/jazz-night");
        assert_eq!(event.image_url.as_deref(), Some("https://venue.example.com/jazz.jpg"));
        assert!(event.interests.contains(&"Music".to_string()));
        assert_eq!(event.source, EventSource::Structured);
    }

    #[test]
    fn parses_graph_and_array_forms() {
        let html = r#"
            <script type="application/ld+json">
            {"@graph": [
                {"@type": "Event", "name": "A", "startDate": "2026-10-01"},
                {"@type": "WebSite", "name": "ignored"}
            ]}
            </script>
            <script type="application/ld+json">
            [{"@type": ["Thing", "TheaterEvent"], "name": "B", "startDate": "2026-10-02"}]
            </script>
        "#;
        let events = parse_structured_events(html, "https://x.example.com/p", &[]);
        let names: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(events[0].time, TIME_UNKNOWN);
    }

    #[test]
    fn skips_nodes_without_name_or_date() {
        let html = r#"
            <script type="application/ld+json">
            [{"@type": "Event", "name": "No Date"},
             {"@type": "Event", "startDate": "2026-10-01"}]
            </script>
        "#;
        let events = parse_structured_events(html, "https://x.example.com/p", &[]);
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_json_is_ignored() {
        let html = r#"<script type="application/ld+json">{not json}</script>"#;
        assert!(parse_structured_events(html, "https://x.example.com/p", &[]).is_empty());
    }

    #[test]
    fn page_title_prefers_og_title() {
        let html = r#"
            <title>Site Wide Title</title>
            <meta property="og:title" content="Specific Event Title" />
        "#;
        assert_eq!(page_title(html).as_deref(), Some("Specific Event Title"));
    }

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(decode_entities("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(decode_entities("caf&#233;"), "café");
        assert_eq!(decode_entities("it&#x2019;s"), "it\u{2019}s");
    }

    #[test]
    fn parse_start_date_variants() {
        assert_eq!(
            parse_start_date("2026-09-12T19:30:00-07:00").unwrap().1,
            "7:30 PM"
        );
        assert_eq!(parse_start_date("2026-09-12T09:05").unwrap().1, "9:05 AM");
        assert_eq!(parse_start_date("2026-09-12").unwrap().1, TIME_UNKNOWN);
        assert!(parse_start_date("next friday").is_none());
    }

    mod batch {
        use super::*;
        use crate::testing::MockFetcher;
        use std::time::Duration;

        #[tokio::test(start_paused = true)]
        async fn batch_respects_visited_ledger() {
            let fetcher = Arc::new(
                MockFetcher::new()
                    .with_page("https://a.example.com/e/1", EVENT_PAGE)
                    .with_page("https://a.example.com/e/2", EVENT_PAGE),
            );
            let extractor = PageExtractor::new(fetcher.clone(), Duration::from_secs(8));
            let ledger = VisitedLedger::new(Duration::from_secs(60 * 60 * 24));
            ledger.record("https://a.example.com/e/2", true);

            let deadline = Instant::now() + Duration::from_secs(30);
            let (events, _) = extractor
                .extract_batch(
                    vec![
                        "https://a.example.com/e/1".into(),
                        "https://a.example.com/e/2".into(),
                    ],
                    &[],
                    4,
                    deadline,
                    &ledger,
                )
                .await;

            assert_eq!(events.len(), 1);
            assert_eq!(fetcher.fetched(), vec!["https://a.example.com/e/1"]);
        }

        #[tokio::test(start_paused = true)]
        async fn batch_records_failures_in_ledger() {
            let fetcher =
                Arc::new(MockFetcher::new().with_failure("https://a.example.com/dead"));
            let extractor = PageExtractor::new(fetcher, Duration::from_secs(8));
            let ledger = VisitedLedger::new(Duration::from_secs(60 * 60 * 24));

            let deadline = Instant::now() + Duration::from_secs(30);
            let (events, candidates) = extractor
                .extract_batch(
                    vec!["https://a.example.com/dead".into()],
                    &[],
                    4,
                    deadline,
                    &ledger,
                )
                .await;

            assert!(events.is_empty());
            assert!(candidates.is_empty());
            assert!(ledger.should_skip("https://a.example.com/dead"));
        }

        #[tokio::test(start_paused = true)]
        async fn batch_truncates_at_deadline() {
            let fetcher = Arc::new(
                MockFetcher::new()
                    .with_page("https://a.example.com/e/1", EVENT_PAGE)
                    .with_page("https://a.example.com/e/2", EVENT_PAGE)
                    .with_latency(Duration::from_secs(10)),
            );
            let extractor = PageExtractor::new(fetcher.clone(), Duration::from_secs(8));
            let ledger = VisitedLedger::new(Duration::from_secs(60 * 60 * 24));

            // Deadline already passed: nothing should launch.
            let deadline = Instant::now();
            let (events, candidates) = extractor
                .extract_batch(
                    vec![
                        "https://a.example.com/e/1".into(),
                        "https://a.example.com/e/2".into(),
                    ],
                    &[],
                    4,
                    deadline,
                    &ledger,
                )
                .await;

            assert!(events.is_empty());
            assert!(candidates.is_empty());
            assert!(fetcher.fetched().is_empty());
        }
    }
}
