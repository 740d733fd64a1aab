//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers;
use crate::presentation::sse::watch_session;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .with_state(state)
}

/// API v1 routes
fn api_routes() -> Router<AppState> {
    Router::new().nest("/sessions", session_routes())
}

/// Session lifecycle routes
fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::session::create_session))
        .route("/current", get(handlers::session::get_current_session))
        .route(
            "/current",
            delete(handlers::session::invalidate_current_session),
        )
        .route(
            "/current/refresh",
            post(handlers::session::refresh_current_session),
        )
        // Invalidation push stream (SSE)
        .route("/watch", get(watch_session))
}
