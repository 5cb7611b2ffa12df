//! Visited-URL ledger.
//!
//! A TTL-bounded record of previously fetched event-page URLs, consulted
//! before each fetch and updated after every attempt. Purely advisory: a
//! miss never affects correctness, only spend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct VisitedRecord {
    recorded_at: Instant,
    #[allow(dead_code)]
    found_events: bool,
}

pub struct VisitedLedger {
    retention: Duration,
    entries: Mutex<HashMap<String, VisitedRecord>>,
}

impl VisitedLedger {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this URL was fetched within the retention window.
    /// Entries past the window are evicted on the way out.
    pub fn should_skip(&self, url: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(url) {
            Some(record) if record.recorded_at.elapsed() < self.retention => true,
            Some(_) => {
                entries.remove(url);
                false
            }
            None => false,
        }
    }

    /// Record a fetch attempt. Success, structured hit, and failure all
    /// count: refetching a dead page wastes budget regardless of outcome.
    pub fn record(&self, url: &str, found_events: bool) {
        self.entries.lock().unwrap().insert(
            url.to_string(),
            VisitedRecord {
                recorded_at: Instant::now(),
                found_events,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
