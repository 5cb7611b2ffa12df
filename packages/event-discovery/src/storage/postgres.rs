//! Postgres-backed event store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{EventStore, StoredEvent, SuggestionRecord};
use crate::suggest::SuggestedSite;
use crate::types::ExtractedEvent;

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                event_date DATE NOT NULL,
                event_time TEXT NOT NULL,
                location TEXT NOT NULL,
                external_link TEXT NOT NULL,
                image_url TEXT,
                interests JSONB NOT NULL DEFAULT '[]',
                vibes JSONB NOT NULL DEFAULT '[]',
                source TEXT NOT NULL,
                canonical_key TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create events table")?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_events_canonical_key ON events(canonical_key)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create canonical key index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS interest_rotation (
                city TEXT NOT NULL,
                interest_signature TEXT NOT NULL,
                next_offset BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (city, interest_signature)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create interest_rotation table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS website_suggestions (
                city TEXT PRIMARY KEY,
                sites JSONB NOT NULL DEFAULT '[]',
                suggested_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create website_suggestions table")?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn insert_events(&self, events: &[ExtractedEvent]) -> Result<usize> {
        let mut inserted = 0;
        for event in events {
            let result = sqlx::query(
                r#"
                INSERT INTO events (
                    id, title, description, event_date, event_time, location,
                    external_link, image_url, interests, vibes, source,
                    canonical_key, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (canonical_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.time)
            .bind(&event.location)
            .bind(&event.external_link)
            .bind(&event.image_url)
            .bind(serde_json::to_value(&event.interests)?)
            .bind(serde_json::to_value(&event.vibes)?)
            .bind(serde_json::to_value(event.source)?.as_str().unwrap_or("structured").to_string())
            .bind(event.canonical_key().to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to insert event")?;

            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn list_events(&self) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, event_date, event_time, location,
                   external_link, image_url, interests, vibes, source,
                   canonical_key, created_at
            FROM events
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list events")?;

        rows.into_iter()
            .map(|r| {
                let source_text: String = r.get("source");
                Ok(StoredEvent {
                    id: r.get("id"),
                    event: ExtractedEvent {
                        title: r.get("title"),
                        description: r.get("description"),
                        date: r.get("event_date"),
                        time: r.get("event_time"),
                        location: r.get("location"),
                        external_link: r.get("external_link"),
                        image_url: r.get("image_url"),
                        interests: serde_json::from_value(r.get("interests"))
                            .unwrap_or_default(),
                        vibes: serde_json::from_value(r.get("vibes")).unwrap_or_default(),
                        source: serde_json::from_value(serde_json::Value::String(source_text))
                            .context("Unknown event source")?,
                    },
                    canonical_key: r.get("canonical_key"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    async fn clear_events(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events")
            .execute(&self.pool)
            .await
            .context("Failed to clear events")?;
        Ok(result.rows_affected())
    }

    async fn get_rotation(&self, city: &str, signature: &str) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT next_offset FROM interest_rotation WHERE city = $1 AND interest_signature = $2",
        )
        .bind(city.to_lowercase())
        .bind(signature)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get rotation offset")?;

        Ok(row.map(|r| r.get("next_offset")))
    }

    async fn set_rotation(&self, city: &str, signature: &str, offset: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interest_rotation (city, interest_signature, next_offset, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (city, interest_signature)
            DO UPDATE SET next_offset = $3, updated_at = $4
            "#,
        )
        .bind(city.to_lowercase())
        .bind(signature)
        .bind(offset)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to set rotation offset")?;
        Ok(())
    }

    async fn get_site_suggestions(&self, city: &str) -> Result<Option<SuggestionRecord>> {
        let row = sqlx::query(
            "SELECT sites, suggested_at FROM website_suggestions WHERE city = $1",
        )
        .bind(city.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get site suggestions")?;

        Ok(row.map(|r| SuggestionRecord {
            sites: serde_json::from_value(r.get("sites")).unwrap_or_default(),
            suggested_at: r.get("suggested_at"),
        }))
    }

    async fn save_site_suggestions(&self, city: &str, sites: &[SuggestedSite]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO website_suggestions (city, sites, suggested_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (city)
            DO UPDATE SET sites = $2, suggested_at = $3
            "#,
        )
        .bind(city.to_lowercase())
        .bind(serde_json::to_value(sites)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to save site suggestions")?;
        Ok(())
    }
}
