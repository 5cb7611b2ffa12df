//! Shared progress state for pollers.
//!
//! One continuously overwritten record per process describing pipeline
//! stage and running counts. Readers get a snapshot; writers are the
//! pipeline stages.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::types::SiteStatus;

/// Pipeline stage, advanced monotonically within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStep {
    Idle,
    Start,
    Search,
    Listings,
    Events,
    Done,
}

/// Running counts, serialized in the wire names pollers expect.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCounts {
    pub brave_sites: usize,
    pub event_links: usize,
    pub candidate_pages: usize,
    pub extracted_events: usize,
}

/// What a poller sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub step: ProgressStep,
    pub sites: Vec<SiteStatus>,
    pub counts: ProgressCounts,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            step: ProgressStep::Idle,
            sites: Vec::new(),
            counts: ProgressCounts::default(),
        }
    }
}

/// Process-wide progress record. Lock scopes never cross an await.
#[derive(Default)]
pub struct ProgressTracker {
    inner: RwLock<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new run and enter `Start`.
    pub fn begin(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = ProgressSnapshot {
            step: ProgressStep::Start,
            ..Default::default()
        };
    }

    /// Advance the stage. Regressions are ignored so a lagging background
    /// continuation cannot rewind a newer run's state.
    pub fn set_step(&self, step: ProgressStep) {
        let mut inner = self.inner.write().unwrap();
        if step > inner.step {
            inner.step = step;
        }
    }

    pub fn record_site(&self, status: SiteStatus) {
        self.inner.write().unwrap().sites.push(status);
    }

    pub fn set_search_sites(&self, n: usize) {
        self.inner.write().unwrap().counts.brave_sites = n;
    }

    pub fn set_event_links(&self, n: usize) {
        self.inner.write().unwrap().counts.event_links = n;
    }

    pub fn set_candidate_pages(&self, n: usize) {
        self.inner.write().unwrap().counts.candidate_pages = n;
    }

    pub fn set_extracted_events(&self, n: usize) {
        self.inner.write().unwrap().counts.extracted_events = n;
    }

    pub fn add_extracted_events(&self, n: usize) {
        self.inner.write().unwrap().counts.extracted_events += n;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.read().unwrap().clone()
    }
}
