//! Core types flowing through the discovery pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DiscoveryLimits;

/// One discovery run's input. Immutable for the duration of the run.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub city: String,
    pub interests: Vec<String>,
    pub vibes: Vec<String>,
    pub limits: DiscoveryLimits,
}

impl DiscoveryRequest {
    pub fn new(city: impl Into<String>, interests: Vec<String>) -> Self {
        Self {
            city: city.into(),
            interests,
            vibes: Vec::new(),
            limits: DiscoveryLimits::default(),
        }
    }

    pub fn with_vibes(mut self, vibes: Vec<String>) -> Self {
        self.vibes = vibes;
        self
    }

    pub fn with_limits(mut self, limits: DiscoveryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Cache signature for the result cache: city + interests + vibes,
    /// order-insensitive and case-normalized.
    pub fn signature(&self) -> String {
        let mut interests: Vec<String> =
            self.interests.iter().map(|i| i.trim().to_lowercase()).collect();
        interests.sort();
        let mut vibes: Vec<String> = self.vibes.iter().map(|v| v.trim().to_lowercase()).collect();
        vibes.sort();
        format!(
            "{}::{}::{}",
            self.city.trim().to_lowercase(),
            interests.join(","),
            vibes.join(",")
        )
    }

    /// Rotation key component: the sorted interest set, city-independent.
    pub fn interest_signature(&self) -> String {
        let mut interests: Vec<String> =
            self.interests.iter().map(|i| i.trim().to_lowercase()).collect();
        interests.sort();
        interests.join(",")
    }
}

/// A candidate listing site produced by search or the suggestion cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteCandidate {
    pub url: String,
    /// Where this candidate came from ("brave", "suggested")
    pub source: String,
    /// The interest whose query surfaced it, if any
    pub interest: Option<String>,
}

/// A page that yielded no structured data and needs batch classification.
#[derive(Debug, Clone)]
pub struct CandidatePage {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
}

/// Provenance of an extracted event, from most to least confident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Parsed from embedded schema.org markup
    Structured,
    /// Confirmed by the batch classifier
    Validated,
    /// Emitted unverified after a classifier failure
    RawFallback,
}

/// A structured event record. Once accepted into the pipeline's output
/// set, title, date, and external_link are never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEvent {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    /// Free text ("7:00 PM") or the "See website" sentinel
    pub time: String,
    pub location: String,
    pub external_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub interests: Vec<String>,
    pub vibes: Vec<String>,
    pub source: EventSource,
}

impl ExtractedEvent {
    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::new(&self.title, self.date, &self.location)
    }
}

/// The dedup identity of an event: case-normalized (title, date, location).
///
/// Storage-assigned identifiers are regenerated every time the same
/// real-world event is rediscovered, so they cannot serve as identity;
/// this composite can.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Pure function of (title, date, location); case-insensitive on the
    /// text fields, date truncated to its calendar-date portion.
    pub fn new(title: &str, date: NaiveDate, location: &str) -> Self {
        Self(format!(
            "{}|{}|{}",
            title.trim().to_lowercase(),
            date.format("%Y-%m-%d"),
            location.trim().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of scraping one candidate site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Success,
    Failed,
}

/// Per-site scraping status, reported to the caller and the progress feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatus {
    pub url: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<String>,
    pub status: ScrapeOutcome,
}

/// The caller-facing synchronous response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub events: Vec<ExtractedEvent>,
    pub scraping_status: Vec<SiteStatus>,
}
