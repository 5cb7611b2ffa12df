//! The discovery orchestrator.
//!
//! Drives the full pipeline — result cache, rotation, search, listings,
//! page extraction, validation, consolidation, persistence — under one
//! wall-clock budget, then hands any unprocessed candidate sites to a
//! fire-and-forget background continuation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::TtlCache;
use crate::config::PipelineConfig;
use crate::consolidate::Consolidator;
use crate::error::Result;
use crate::gate::{CompletionGate, GateConfig};
use crate::links::extract_event_links;
use crate::pages::PageExtractor;
use crate::progress::{ProgressStep, ProgressTracker};
use crate::rotation;
use crate::search::SearchClient;
use crate::storage::EventStore;
use crate::suggest::SuggestionService;
use crate::traits::{CompletionBackend, PageFetcher, SearchProvider};
use crate::types::{
    DiscoveryRequest, DiscoveryResponse, ExtractedEvent, ScrapeOutcome, SiteStatus,
    WebsiteCandidate,
};
use crate::validator::Validator;
use crate::visited::VisitedLedger;

/// One orchestrator per process. Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Orchestrator {
    search: Arc<SearchClient>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: PageExtractor,
    validator: Arc<Validator>,
    consolidator: Arc<Consolidator>,
    suggestions: Arc<SuggestionService>,
    store: Arc<dyn EventStore>,
    ledger: Arc<VisitedLedger>,
    progress: Arc<ProgressTracker>,
    result_cache: Arc<TtlCache<String, DiscoveryResponse>>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        search_provider: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        backend: Arc<dyn CompletionBackend>,
        store: Arc<dyn EventStore>,
        config: PipelineConfig,
        gate_config: GateConfig,
    ) -> Self {
        let gate = Arc::new(CompletionGate::new(backend, gate_config));
        let validator = Arc::new(Validator::new(
            gate.clone(),
            config.model.clone(),
            config.validation_batch_size,
            config.completion_cache_ttl,
            config.fallback,
        ));
        let consolidator = Arc::new(Consolidator::new(
            gate.clone(),
            config.model.clone(),
            config.ranking_skip_threshold,
            config.max_events,
            config.completion_cache_ttl,
        ));
        let suggestions = Arc::new(SuggestionService::new(
            gate,
            store.clone(),
            config.model.clone(),
            config.suggestion_ttl,
            config.completion_cache_ttl,
        ));

        Self {
            search: Arc::new(SearchClient::new(search_provider, config.search_delay)),
            extractor: PageExtractor::new(fetcher.clone(), config.page_timeout),
            fetcher,
            validator,
            consolidator,
            suggestions,
            store,
            ledger: Arc::new(VisitedLedger::new(config.visited_retention)),
            progress: Arc::new(ProgressTracker::new()),
            result_cache: Arc::new(TtlCache::new(config.result_cache_ttl)),
            config,
        }
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        self.store.clone()
    }

    /// Run one discovery. Always returns a well-formed response; partial
    /// failure shows up as zero events and failed `scraping_status`
    /// entries, never as an error.
    pub async fn discover(&self, request: DiscoveryRequest) -> Result<DiscoveryResponse> {
        let mut request = request;
        request.limits = request.limits.clone().clamped();

        // Dominant fast path for repeated requests.
        let signature = request.signature();
        if let Some(cached) = self.result_cache.get(&signature) {
            info!(city = %request.city, "Discovery result cache hit");
            return Ok(cached);
        }

        let deadline = Instant::now() + request.limits.time_budget;
        self.progress.begin();
        info!(
            city = %request.city,
            interests = ?request.interests,
            budget_ms = request.limits.time_budget.as_millis() as u64,
            "Starting discovery run"
        );

        let interests = rotation::rotated_interests(self.store.as_ref(), &request).await;

        self.progress.set_step(ProgressStep::Search);
        let mut sites = self
            .search
            .find_candidate_sites(
                &interests,
                &request.city,
                request.limits.results_per_query,
                request.limits.interests_limit,
            )
            .await;

        let mut seen: HashSet<String> = sites.iter().map(|s| s.url.clone()).collect();
        for candidate in self.suggestions.candidate_sites(&request.city).await {
            if seen.insert(candidate.url.clone()) {
                sites.push(candidate);
            }
        }
        self.progress.set_search_sites(sites.len());

        // The priority batch runs now; the remainder continues after the
        // response is sent.
        let remainder = if sites.len() > request.limits.max_sites {
            sites.split_off(request.limits.max_sites)
        } else {
            Vec::new()
        };

        let (events, statuses) = self.run_pipeline(sites, &request, deadline, true).await;

        let response = DiscoveryResponse {
            events,
            scraping_status: statuses,
        };
        self.result_cache.insert(signature, response.clone());
        self.progress.set_step(ProgressStep::Done);

        if !remainder.is_empty() {
            let orchestrator = self.clone();
            let request = request.clone();
            info!(sites = remainder.len(), "Launching background continuation");
            tokio::spawn(async move {
                orchestrator.continue_in_background(remainder, request).await;
            });
        }

        info!(
            city = %request.city,
            events = response.events.len(),
            "Discovery run completed"
        );
        Ok(response)
    }

    /// The fire-and-forget remainder of a run. No caller-facing deadline,
    /// but the same bounded-time discipline; reports only through the
    /// progress tracker and the store.
    async fn continue_in_background(&self, sites: Vec<WebsiteCandidate>, request: DiscoveryRequest) {
        let deadline = Instant::now() + request.limits.time_budget;
        let (events, _) = self.run_pipeline(sites, &request, deadline, false).await;
        info!(events = events.len(), "Background continuation finished");
    }

    /// Listings → pages → validation → consolidation → persistence for
    /// one batch of candidate sites.
    async fn run_pipeline(
        &self,
        sites: Vec<WebsiteCandidate>,
        request: &DiscoveryRequest,
        deadline: Instant,
        rank: bool,
    ) -> (Vec<ExtractedEvent>, Vec<SiteStatus>) {
        self.progress.set_step(ProgressStep::Listings);
        let (links, statuses) = self
            .scrape_listings(&sites, request.limits.max_links, deadline)
            .await;
        self.progress.set_event_links(links.len());

        self.progress.set_step(ProgressStep::Events);
        let (structured, mut candidates) = self
            .extractor
            .extract_batch(
                links,
                &request.vibes,
                self.config.fetch_concurrency,
                deadline,
                &self.ledger,
            )
            .await;
        candidates.truncate(request.limits.max_candidates);
        self.progress.set_candidate_pages(candidates.len());
        self.progress.set_extracted_events(structured.len());

        // Persist a confident slice before the expensive ranking step so
        // pollers can show results while the run finishes.
        if !structured.is_empty() {
            let early: Vec<ExtractedEvent> = structured
                .iter()
                .take(self.config.early_persist_limit)
                .cloned()
                .collect();
            if let Err(e) = self.store.insert_events(&early).await {
                warn!(error = %e, "Early persist failed");
            }
        }

        let validated = if candidates.is_empty() {
            Vec::new()
        } else {
            self.validator.validate(candidates, request).await
        };

        let mut combined = structured;
        combined.extend(validated);

        let remaining = if rank {
            deadline.saturating_duration_since(Instant::now())
        } else {
            // Background batches never spend budget on ranking.
            Duration::ZERO
        };
        let consolidated = self
            .consolidator
            .consolidate(combined, request, remaining, self.config.ranking_reserve)
            .await;

        if !consolidated.is_empty() {
            match self.store.insert_events(&consolidated).await {
                Ok(inserted) => debug!(inserted, total = consolidated.len(), "Events persisted"),
                Err(e) => warn!(error = %e, "Failed to persist events"),
            }
        }
        self.progress.set_extracted_events(consolidated.len());

        (consolidated, statuses)
    }

    /// Fetch listing sites sequentially and pull candidate event links,
    /// truncating against the link cap and the time budget.
    async fn scrape_listings(
        &self,
        sites: &[WebsiteCandidate],
        max_links: usize,
        deadline: Instant,
    ) -> (Vec<String>, Vec<SiteStatus>) {
        let mut links: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut statuses = Vec::new();

        for site in sites {
            if Instant::now() >= deadline {
                debug!("Time budget reached, truncating listing scrape");
                break;
            }
            if links.len() >= max_links {
                break;
            }

            let outcome = match self.fetcher.fetch(&site.url, self.config.listing_timeout).await {
                Ok(page) => {
                    if let Ok(base) = Url::parse(&page.url) {
                        let found =
                            extract_event_links(&base, &page.html, max_links - links.len());
                        debug!(url = %site.url, count = found.len(), "Listing scraped");
                        for link in found {
                            if seen.insert(link.clone()) {
                                links.push(link);
                            }
                        }
                    }
                    ScrapeOutcome::Success
                }
                Err(e) => {
                    warn!(url = %site.url, error = %e, "Listing fetch failed");
                    ScrapeOutcome::Failed
                }
            };

            let status = SiteStatus {
                url: site.url.clone(),
                source: site.source.clone(),
                interest: site.interest.clone(),
                status: outcome,
            };
            self.progress.record_site(status.clone());
            statuses.push(status);
        }

        (links, statuses)
    }
}
