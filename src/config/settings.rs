//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Session lifecycle settings (TTL, create retries)
    pub session: SessionSettings,

    /// Invalidation notifier settings (tick cadence, stream ceiling)
    pub notifier: NotifierSettings,

    /// Idle monitor defaults handed to clients
    pub idle: IdleSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Session creation and expiry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Default session lifetime in seconds when the caller omits a TTL
    pub default_ttl_secs: u64,

    /// Attempts for the atomic create unit before giving up on transient
    /// storage failures
    pub max_create_attempts: u32,

    /// Base backoff between create attempts in milliseconds (grows linearly)
    pub retry_backoff_ms: u64,
}

impl SessionSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Invalidation notifier (push stream) configuration.
///
/// The 500 ms tick is a deliberate fast-logout requirement: a displaced
/// client must notice within about one second that it was logged out
/// elsewhere.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierSettings {
    /// Liveness check cadence in milliseconds
    pub tick_ms: u64,

    /// Emit a heartbeat event every N ticks (~10 s at defaults) to keep
    /// intermediary proxies from closing the stream
    pub heartbeat_every_ticks: u32,

    /// Safety ceiling: streams older than this get a terminal `timeout`
    /// event and close
    pub max_stream_secs: u64,

    /// Consecutive storage failures tolerated before escalating to a
    /// `timeout` terminal event
    pub max_consecutive_failures: u32,
}

impl NotifierSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn max_stream_duration(&self) -> Duration {
        Duration::from_secs(self.max_stream_secs)
    }
}

/// Idle monitor configuration.
///
/// The monitor itself runs client-side; the server hands these defaults to
/// clients so the inactivity policy stays centrally managed.
#[derive(Debug, Clone, Deserialize)]
pub struct IdleSettings {
    /// Whether inactivity logout is enforced at all
    pub enabled: bool,

    /// Total inactivity budget in seconds
    pub timeout_secs: u64,

    /// Warning window before the budget runs out, in seconds
    pub warning_secs: u64,
}

impl IdleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn warning_time(&self) -> Duration {
        Duration::from_secs(self.warning_secs)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the idle warning window is not shorter than the idle timeout.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("session.default_ttl_secs", 86400_i64)? // 24h
            .set_default("session.max_create_attempts", 3)?
            .set_default("session.retry_backoff_ms", 50)?
            .set_default("notifier.tick_ms", 500)?
            .set_default("notifier.heartbeat_every_ticks", 20)?
            .set_default("notifier.max_stream_secs", 3600_i64)? // 1h ceiling
            .set_default("notifier.max_consecutive_failures", 8)?
            .set_default("idle.enabled", true)?
            .set_default("idle.timeout_secs", 3600_i64)? // 60 min
            .set_default("idle.warning_secs", 300_i64)? // 5 min
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                if settings.idle.warning_secs >= settings.idle.timeout_secs {
                    return Err(ConfigError::Message(format!(
                        "idle.warning_secs ({}) must be shorter than idle.timeout_secs ({})",
                        settings.idle.warning_secs, settings.idle.timeout_secs
                    )));
                }
                if settings.notifier.tick_ms == 0 {
                    return Err(ConfigError::Message(
                        "notifier.tick_ms must be non-zero".into(),
                    ));
                }
                Ok(settings)
            })
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DatabaseSettings {
    /// Get the connection URL.
    pub fn connection_url(&self) -> &str {
        &self.url
    }
}
