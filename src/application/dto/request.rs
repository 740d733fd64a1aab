//! Request DTOs
//!
//! Data structures for API request bodies and query parameters.

use serde::Deserialize;
use validator::Validate;

/// Upper bound on a requested TTL (10 years). Also keeps the value well
/// inside the range signed duration arithmetic can represent.
pub const MAX_TTL_SECS: u64 = 315_360_000;

/// Create session request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(range(min = 1, message = "User id must be positive"))]
    pub user_id: i64,

    /// Optional TTL override in seconds; the configured default applies
    /// when omitted
    #[validate(range(
        min = 1,
        max = 315_360_000,
        message = "TTL must be between 1 second and 10 years"
    ))]
    pub ttl_secs: Option<u64>,
}

/// Refresh session request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshSessionRequest {
    #[validate(range(
        min = 1,
        max = 315_360_000,
        message = "TTL must be between 1 second and 10 years"
    ))]
    pub ttl_secs: Option<u64>,
}

/// Query parameters for session invalidation
#[derive(Debug, Deserialize)]
pub struct InvalidateParams {
    /// Invalidation reason code; defaults to `user_logout`
    pub reason: Option<String>,
}
