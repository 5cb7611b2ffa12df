//! In-memory storage implementation for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{EventStore, StoredEvent, SuggestionRecord};
use crate::suggest::SuggestedSite;
use crate::types::ExtractedEvent;

/// In-memory event store. Data is lost on restart; the unique-key
/// semantics mirror the Postgres implementation exactly.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<String, StoredEvent>>,
    rotation: RwLock<HashMap<(String, String), i64>>,
    suggestions: RwLock<HashMap<String, SuggestionRecord>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_events(&self, events: &[ExtractedEvent]) -> Result<usize> {
        let mut stored = self.events.write().unwrap();
        let mut inserted = 0;
        for event in events {
            let key = event.canonical_key().to_string();
            if stored.contains_key(&key) {
                continue;
            }
            stored.insert(
                key.clone(),
                StoredEvent {
                    id: Uuid::new_v4(),
                    event: event.clone(),
                    canonical_key: key,
                    created_at: Utc::now(),
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list_events(&self) -> Result<Vec<StoredEvent>> {
        let mut events: Vec<StoredEvent> =
            self.events.read().unwrap().values().cloned().collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn clear_events(&self) -> Result<u64> {
        let mut events = self.events.write().unwrap();
        let removed = events.len() as u64;
        events.clear();
        Ok(removed)
    }

    async fn get_rotation(&self, city: &str, signature: &str) -> Result<Option<i64>> {
        Ok(self
            .rotation
            .read()
            .unwrap()
            .get(&(city.to_lowercase(), signature.to_string()))
            .copied())
    }

    async fn set_rotation(&self, city: &str, signature: &str, offset: i64) -> Result<()> {
        self.rotation
            .write()
            .unwrap()
            .insert((city.to_lowercase(), signature.to_string()), offset);
        Ok(())
    }

    async fn get_site_suggestions(&self, city: &str) -> Result<Option<SuggestionRecord>> {
        Ok(self
            .suggestions
            .read()
            .unwrap()
            .get(&city.to_lowercase())
            .cloned())
    }

    async fn save_site_suggestions(&self, city: &str, sites: &[SuggestedSite]) -> Result<()> {
        self.suggestions.write().unwrap().insert(
            city.to_lowercase(),
            SuggestionRecord {
                sites: sites.to_vec(),
                suggested_at: Utc::now(),
            },
        );
        Ok(())
    }
}
