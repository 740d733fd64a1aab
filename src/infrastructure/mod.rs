//! Infrastructure Layer
//!
//! Contains implementations for external services:
//! - Database connection pool (PostgreSQL)
//! - SessionStore implementations (Postgres, in-memory)

pub mod database;
pub mod repositories;
