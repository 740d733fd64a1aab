//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::domain::SessionStore;
use crate::infrastructure::database;
use crate::infrastructure::repositories::PgSessionStore;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::sse::WatcherRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session storage; trait object so tests can run over the in-memory
    /// store without a database
    pub store: Arc<dyn SessionStore>,
    pub registry: Arc<WatcherRegistry>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        database::run_migrations(&db).await?;

        let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(db));
        let registry = Arc::new(WatcherRegistry::new());

        crate::presentation::http::handlers::health::init_server_start();

        // Create app state
        let state = AppState {
            store,
            registry,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to address
        let addr = settings.server_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
