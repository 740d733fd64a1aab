//! # Session Sentinel
//!
//! Session lifecycle server enforcing a single active session per user.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool and migrations
//! - HTTP server with the invalidation push stream

use anyhow::Result;
use tracing::info;

use session_sentinel::config::Settings;
use session_sentinel::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    session_sentinel::telemetry::init_tracing();

    info!("Starting Session Sentinel...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
