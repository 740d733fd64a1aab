//! SessionStore Implementations
//!
//! Concrete implementations of the `SessionStore` trait defined in the
//! domain layer.
//!
//! - **PgSessionStore** - production backend; the create unit runs inside a
//!   transaction holding a per-user advisory lock
//! - **MemorySessionStore** - in-process backend for tests and local
//!   development, same contract, mutex-serialized

pub mod memory_session_store;
pub mod pg_session_store;

pub use memory_session_store::MemorySessionStore;
pub use pg_session_store::PgSessionStore;
