//! Server-Push Module
//!
//! Server-Sent Events surface for session invalidation. A client opens one
//! stream per tab right after login and reacts to terminal events by
//! logging out locally or reconnecting.

pub mod events;
pub mod handler;
pub mod notifier;
pub mod registry;

pub use events::SessionEvent;
pub use handler::watch_session;
pub use notifier::InvalidationNotifier;
pub use registry::{WatcherGuard, WatcherRegistry};
