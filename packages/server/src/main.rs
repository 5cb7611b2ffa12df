//! Event discovery server.

mod app;
mod config;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brave_client::BraveClient;
use event_discovery::providers::{BraveSearchProvider, HttpPageFetcher, OpenAIBackend};
use event_discovery::storage::{MemoryEventStore, PostgresEventStore};
use event_discovery::{EventStore, GateConfig, Orchestrator, PipelineConfig};
use openai_client::OpenAIClient;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,event_discovery=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config = ServerConfig::from_env().context("Server configuration invalid")?;

    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("Failed to connect to Postgres")?;
            let store = PostgresEventStore::new(pool);
            store.ensure_schema().await.context("Schema setup failed")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryEventStore::new())
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(BraveSearchProvider::new(BraveClient::new(
            config.brave_api_key.clone(),
        ))),
        Arc::new(HttpPageFetcher::new()),
        Arc::new(OpenAIBackend::new(OpenAIClient::new(
            config.openai_api_key.clone(),
        ))),
        store,
        PipelineConfig::default(),
        GateConfig::default(),
    ));

    let app = app::build_app(orchestrator);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(addr = %addr, "Event discovery server listening");
    axum::serve(listener, app).await.context("Server crashed")?;

    Ok(())
}
