//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **SessionGuard**: enforces the single-active-session invariant at
//!   login, handles logout and liveness checks
//! - **IdleMonitor**: client-resident inactivity state machine with a
//!   warning grace period

pub mod idle_monitor;
pub mod session_guard;

// Re-export session guard types
pub use session_guard::{hash_token, IssuedSession, SessionError, SessionGuard};

// Re-export idle monitor types
pub use idle_monitor::{
    ActivitySignal, IdleMonitor, IdleMonitorConfig, IdleState, SignoutReason,
};
