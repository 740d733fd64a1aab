//! Common Test Utilities
//!
//! Shared helpers and test infrastructure. The application under test runs
//! over the in-memory session store, so no database is required.

use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use serde_json::Value;
use tower::ServiceExt;

use session_sentinel::config::{
    CorsSettings, DatabaseSettings, IdleSettings, NotifierSettings, ServerSettings,
    SessionSettings, Settings,
};
use session_sentinel::infrastructure::repositories::MemorySessionStore;
use session_sentinel::presentation::http::create_router;
use session_sentinel::presentation::sse::WatcherRegistry;
use session_sentinel::startup::AppState;

/// Settings with short durations so stream tests run in milliseconds of
/// virtual time.
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused-in-tests/sessions".into(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
        },
        session: SessionSettings {
            default_ttl_secs: 3600,
            max_create_attempts: 3,
            retry_backoff_ms: 1,
        },
        notifier: NotifierSettings {
            tick_ms: 500,
            heartbeat_every_ticks: 20,
            max_stream_secs: 3600,
            max_consecutive_failures: 8,
        },
        idle: IdleSettings {
            enabled: true,
            timeout_secs: 3600,
            warning_secs: 300,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        environment: "test".into(),
    }
}

/// Test application over the in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemorySessionStore>,
    pub registry: Arc<WatcherRegistry>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemorySessionStore::new()))
    }

    pub fn with_store(store: Arc<MemorySessionStore>) -> Self {
        let registry = Arc::new(WatcherRegistry::new());
        let state = AppState {
            store: store.clone(),
            registry: registry.clone(),
            settings: Arc::new(test_settings()),
        };
        Self {
            router: create_router(state),
            store,
            registry,
        }
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(
        &self,
        uri: &str,
        body: &str,
        token: &str,
    ) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make an authenticated DELETE request
    pub async fn delete_auth(&self, uri: &str, token: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(uri)
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Log in user and return the bearer token
    pub async fn login(&self, user_id: i64) -> String {
        let response = self
            .post_json(
                "/api/v1/sessions",
                &format!(r#"{{"user_id": {}}}"#, user_id),
            )
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let body = read_json(response).await;
        body["token"].as_str().unwrap().to_string()
    }
}

/// Read a response body as JSON
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
