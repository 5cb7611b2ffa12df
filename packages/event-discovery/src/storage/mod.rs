//! Persistence gateway.
//!
//! Events are identified by their canonical key, not their generated id:
//! ids are regenerated every time the same real-world event is
//! rediscovered, so the unique index on the canonical key is what makes
//! persistence idempotent.

mod memory;
mod postgres;

pub use memory::MemoryEventStore;
pub use postgres::PostgresEventStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::suggest::SuggestedSite;
use crate::types::ExtractedEvent;

/// A persisted event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: Uuid,
    #[serde(flatten)]
    pub event: ExtractedEvent,
    pub canonical_key: String,
    pub created_at: DateTime<Utc>,
}

/// Cached per-city site suggestions with their timestamp for TTL checks.
#[derive(Debug, Clone)]
pub struct SuggestionRecord {
    pub sites: Vec<SuggestedSite>,
    pub suggested_at: DateTime<Utc>,
}

/// Durable storage consumed by the pipeline and the API layer.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert events, ignoring canonical-key conflicts.
    /// Returns how many rows were actually inserted.
    async fn insert_events(&self, events: &[ExtractedEvent]) -> Result<usize>;

    /// Bulk list, newest first.
    async fn list_events(&self) -> Result<Vec<StoredEvent>>;

    /// Administrative reset. Returns how many rows were removed.
    async fn clear_events(&self) -> Result<u64>;

    /// Interest-rotation offset for (city, sorted-interest-signature).
    async fn get_rotation(&self, city: &str, signature: &str) -> Result<Option<i64>>;

    async fn set_rotation(&self, city: &str, signature: &str, offset: i64) -> Result<()>;

    /// Cached site suggestions for a city, with timestamp.
    async fn get_site_suggestions(&self, city: &str) -> Result<Option<SuggestionRecord>>;

    async fn save_site_suggestions(&self, city: &str, sites: &[SuggestedSite]) -> Result<()>;
}
