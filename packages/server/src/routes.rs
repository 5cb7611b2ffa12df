//! HTTP handlers for the discovery API.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use event_discovery::{DiscoveryLimits, DiscoveryRequest, EventStore};

use crate::app::AppState;

/// Inbound discovery request. All numeric fields are clamped server-side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverBody {
    pub city: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub vibes: Vec<String>,
    pub limit: Option<usize>,
    pub sites_limit: Option<usize>,
    pub results_per_query: Option<usize>,
    pub interests_limit: Option<usize>,
    pub skip_ranking: Option<bool>,
    pub timeout_ms: Option<u64>,
}

impl DiscoverBody {
    fn into_request(self) -> DiscoveryRequest {
        let defaults = DiscoveryLimits::default();
        let limits = DiscoveryLimits {
            max_links: self.limit.unwrap_or(defaults.max_links),
            max_sites: self.sites_limit.unwrap_or(defaults.max_sites),
            results_per_query: self.results_per_query.unwrap_or(defaults.results_per_query),
            interests_limit: self.interests_limit.unwrap_or(defaults.interests_limit),
            skip_ranking: self.skip_ranking.unwrap_or(defaults.skip_ranking),
            time_budget: self
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.time_budget),
            ..defaults
        }
        .clamped();

        DiscoveryRequest::new(self.city, self.interests)
            .with_vibes(self.vibes)
            .with_limits(limits)
    }
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    error!(error = %err, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": err.to_string()})),
    )
        .into_response()
}

/// POST /api/discover
pub async fn discover(
    State(state): State<AppState>,
    Json(body): Json<DiscoverBody>,
) -> Response {
    if body.city.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "city is required"})),
        )
            .into_response();
    }

    match state.orchestrator.discover(body.into_request()).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/discover/progress
pub async fn progress(State(state): State<AppState>) -> Response {
    Json(state.orchestrator.progress().snapshot()).into_response()
}

/// GET /api/events
pub async fn list_events(State(state): State<AppState>) -> Response {
    match state.orchestrator.store().list_events().await {
        Ok(events) => Json(events).into_response(),
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/events
pub async fn clear_events(State(state): State<AppState>) -> Response {
    match state.orchestrator.store().clear_events().await {
        Ok(cleared) => Json(json!({"cleared": cleared})).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}
