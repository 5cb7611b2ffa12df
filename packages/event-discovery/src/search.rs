//! Search client: turns interests into candidate listing sites.
//!
//! Issues templated queries per rotation-ordered interest against the
//! external search API, paced by a short fixed delay, and deduplicates
//! the combined result by URL. Failures are logged and skipped; search
//! never aborts a run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::traits::SearchProvider;
use crate::types::WebsiteCandidate;

/// Domains that drown out local listings with aggregator noise.
const BLOCKED_DOMAINS: &[&str] = &[
    "meetup.com",
    "groupon.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "reddit.com",
    "youtube.com",
    "tiktok.com",
    "yelp.com",
    "tripadvisor.com",
    "wikipedia.org",
];

pub struct SearchClient {
    provider: Arc<dyn SearchProvider>,
    delay: Duration,
}

impl SearchClient {
    pub fn new(provider: Arc<dyn SearchProvider>, delay: Duration) -> Self {
        Self { provider, delay }
    }

    /// Find candidate listing sites for the first `interests_limit`
    /// interests, two query variants each.
    pub async fn find_candidate_sites(
        &self,
        interests: &[String],
        city: &str,
        results_per_query: usize,
        interests_limit: usize,
    ) -> Vec<WebsiteCandidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();
        let mut first_call = true;

        for interest in interests.iter().take(interests_limit) {
            for query in query_templates(interest, city) {
                if !first_call {
                    tokio::time::sleep(self.delay).await;
                }
                first_call = false;

                match self.provider.search(&query, results_per_query).await {
                    Ok(hits) => {
                        for hit in hits {
                            if is_blocked_domain(&hit.url) {
                                continue;
                            }
                            if seen.insert(hit.url.clone()) {
                                candidates.push(WebsiteCandidate {
                                    url: hit.url,
                                    source: "brave".to_string(),
                                    interest: Some(interest.clone()),
                                });
                            }
                        }
                    }
                    Err(e) => {
                        warn!(query = %query, error = %e, "Search query failed");
                    }
                }
            }
        }

        debug!(city, count = candidates.len(), "Candidate site search completed");
        candidates
    }
}

fn query_templates(interest: &str, city: &str) -> [String; 2] {
    [
        format!("{} events in {}", interest, city),
        format!("upcoming {} {} calendar", interest.to_lowercase(), city),
    ]
}

fn is_blocked_domain(raw_url: &str) -> bool {
    let Ok(url) = Url::parse(raw_url) else {
        return true;
    };
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host.trim_start_matches("www.");
    BLOCKED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSearch;

    #[tokio::test(start_paused = true)]
    async fn dedupes_across_queries_and_interests() {
        let provider = Arc::new(MockSearch::new().with_any(&[
            "https://sfyoga.example.com/classes",
            "https://sfyoga.example.com/classes",
            "https://parks.example.org/events",
        ]));
        let client = SearchClient::new(provider, Duration::from_millis(10));

        let sites = client
            .find_candidate_sites(
                &["Yoga".to_string(), "Music".to_string()],
                "San Francisco",
                5,
                2,
            )
            .await;

        let urls: Vec<&str> = sites.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://sfyoga.example.com/classes",
                "https://parks.example.org/events"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drops_aggregator_domains() {
        let provider = Arc::new(MockSearch::new().with_any(&[
            "https://www.meetup.com/sf-yoga",
            "https://events.meetup.com/sf-yoga",
            "https://localstudio.example.com/schedule",
        ]));
        let client = SearchClient::new(provider, Duration::from_millis(10));

        let sites = client
            .find_candidate_sites(&["Yoga".to_string()], "San Francisco", 5, 3)
            .await;

        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].url, "https://localstudio.example.com/schedule");
        assert_eq!(sites[0].interest.as_deref(), Some("Yoga"));
    }

    #[tokio::test(start_paused = true)]
    async fn respects_interests_limit() {
        let provider = Arc::new(MockSearch::new());
        let client = SearchClient::new(provider.clone(), Duration::from_millis(10));

        let interests: Vec<String> =
            ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        client
            .find_candidate_sites(&interests, "Austin", 5, 2)
            .await;

        // Two query templates per interest, first two interests only.
        assert_eq!(provider.queries().len(), 4);
    }
}
