//! CORS Layer
//!
//! The watch stream is consumed cross-origin by the helpdesk frontend, so
//! the allowed-origin list matters more here than for a plain JSON API.

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

/// Build the CORS layer from the configured origin list.
///
/// Origins that fail to parse as header values are logged and skipped
/// rather than aborting startup. An empty effective list falls back to a
/// permissive policy, which is only appropriate for local development.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = Vec::with_capacity(settings.allowed_origins.len());
    for raw in &settings.allowed_origins {
        match raw.parse::<HeaderValue>() {
            Ok(origin) => origins.push(origin),
            Err(_) => tracing::warn!(origin = %raw, "Skipping unparseable CORS origin"),
        }
    }

    if origins.is_empty() {
        tracing::warn!("No CORS origins configured, allowing any origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600))
}
