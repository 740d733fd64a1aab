//! # Domain Entities
//!
//! The session lifecycle service persists a single entity: the session
//! record. Everything else in the system (users, tickets, knowledge base)
//! belongs to external collaborators and is referenced by opaque ids only.

mod session;

pub use session::{
    CreatedSession, InvalidationReason, Liveness, SessionRecord, SessionStore,
};
