//! Pipeline configuration and per-request limits.

use std::time::Duration;

/// Per-request tunables. All numeric fields are clamped to safe ranges on
/// construction so callers cannot request unbounded work.
#[derive(Debug, Clone)]
pub struct DiscoveryLimits {
    /// Maximum event-page links fetched per run
    pub max_links: usize,
    /// Maximum candidate sites scraped for links
    pub max_sites: usize,
    /// Maximum unstructured pages sent to the classifier
    pub max_candidates: usize,
    /// Search results requested per query
    pub results_per_query: usize,
    /// How many interests get their own search queries
    pub interests_limit: usize,
    /// Skip the comprehensive ranking call entirely
    pub skip_ranking: bool,
    /// Overall wall-clock budget for the synchronous part of the run
    pub time_budget: Duration,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_links: 40,
            max_sites: 6,
            max_candidates: 30,
            results_per_query: 5,
            interests_limit: 3,
            skip_ranking: false,
            time_budget: Duration::from_secs(25),
        }
    }
}

impl DiscoveryLimits {
    /// Clamp every field into its safe range.
    pub fn clamped(mut self) -> Self {
        self.max_links = self.max_links.clamp(1, 100);
        self.max_sites = self.max_sites.clamp(1, 20);
        self.max_candidates = self.max_candidates.clamp(1, 50);
        self.results_per_query = self.results_per_query.clamp(1, 20);
        self.interests_limit = self.interests_limit.clamp(1, 8);
        self.time_budget = self
            .time_budget
            .clamp(Duration::from_secs(5), Duration::from_secs(120));
        self
    }
}

/// Process-wide pipeline configuration, shared by all runs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Completion model used for classification and ranking
    pub model: String,
    /// Timeout for listing-site fetches
    pub listing_timeout: Duration,
    /// Timeout for individual event-page fetches (shorter than listings)
    pub page_timeout: Duration,
    /// Width of the page-fetch worker pool
    pub fetch_concurrency: usize,
    /// Maximum candidate pages per classification call
    pub validation_batch_size: usize,
    /// Pre-classification event count above which ranking is skipped
    pub ranking_skip_threshold: usize,
    /// Minimum remaining budget required to attempt the ranking call
    pub ranking_reserve: Duration,
    /// How many structured events to persist before ranking
    pub early_persist_limit: usize,
    /// Cap on the final event set
    pub max_events: usize,
    /// Fixed delay between search-API calls
    pub search_delay: Duration,
    /// TTL of the discovery-result cache
    pub result_cache_ttl: Duration,
    /// TTL of cached completion-API responses
    pub completion_cache_ttl: Duration,
    /// TTL of the durable per-city website-suggestion cache
    pub suggestion_ttl: Duration,
    /// Retention window of the visited-URL ledger
    pub visited_retention: Duration,
    /// What to do with candidates when the classifier is unavailable
    pub fallback: FallbackPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            listing_timeout: Duration::from_secs(12),
            page_timeout: Duration::from_secs(8),
            fetch_concurrency: 4,
            validation_batch_size: 30,
            ranking_skip_threshold: 100,
            ranking_reserve: Duration::from_secs(5),
            early_persist_limit: 8,
            max_events: 60,
            search_delay: Duration::from_millis(1000),
            result_cache_ttl: Duration::from_secs(10 * 60),
            completion_cache_ttl: Duration::from_secs(15 * 60),
            suggestion_ttl: Duration::from_secs(3 * 24 * 60 * 60),
            visited_retention: Duration::from_secs(24 * 60 * 60),
            fallback: FallbackPolicy::EmitRaw,
        }
    }
}

/// Policy for candidates left unclassified by a completion failure or an
/// active cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Emit them as low-confidence `RawFallback` events (reference behavior)
    EmitRaw,
    /// Discard them
    Drop,
}
