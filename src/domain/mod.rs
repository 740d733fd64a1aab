//! # Domain Layer
//!
//! The domain layer contains the core business rules of the session
//! lifecycle service. It is independent of any external frameworks or
//! infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: The SessionRecord entity and the SessionStore trait
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - The store trait defines the data access contract, including the one
//!   atomic unit the single-active-session invariant relies on
//! - Entities encapsulate liveness rules

pub mod entities;

// Re-export commonly used types
pub use entities::*;
