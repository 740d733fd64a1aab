//! # Session Sentinel
//!
//! Session lifecycle service enforcing a single active session per user:
//! - Atomic login-time session replacement (one live session per user)
//! - Server-push invalidation stream so displaced clients log out fast
//! - Client-resident idle monitor with a warning grace period
//! - PostgreSQL for persistent session storage
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Session entity and the storage trait
//! - **Application Layer**: Session guard, idle monitor, and DTOs
//! - **Infrastructure Layer**: PostgreSQL and in-memory store implementations
//! - **Presentation Layer**: HTTP handlers and the SSE push stream
//!
//! ## Module Structure
//!
//! ```text
//! session_sentinel/
//! +-- config/        Configuration management
//! +-- domain/        Session entity and store trait
//! +-- application/   Session guard, idle monitor, DTOs
//! +-- infrastructure/ Database and store implementations
//! +-- presentation/  HTTP routes and SSE push stream
//! +-- shared/        Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers and push stream
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
