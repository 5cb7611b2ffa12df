//! Router and shared application state.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use event_discovery::Orchestrator;

use crate::routes;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the Axum application router.
pub fn build_app(orchestrator: Arc<Orchestrator>) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/discover", post(routes::discover))
        .route("/api/discover/progress", get(routes::progress))
        .route(
            "/api/events",
            get(routes::list_events).delete(routes::clear_events),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
