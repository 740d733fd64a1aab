//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::IssuedSession;
use crate::domain::{Liveness, SessionRecord};

/// Session details exposed to clients (never includes the token hash).
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub user_id: i64,
    pub created_at: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidation_reason: Option<String>,
}

impl From<SessionRecord> for SessionView {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            user_id: record.user_id,
            created_at: record.created_at.to_rfc3339(),
            expires_at: record.expires_at.to_rfc3339(),
            invalidated_at: record.invalidated_at.map(|t| t.to_rfc3339()),
            invalidation_reason: record.invalidation_reason.map(|r| r.as_str().to_string()),
        }
    }
}

/// Response to a successful session creation.
#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub session: SessionView,
    /// Opaque bearer token; shown exactly once, only its hash is stored
    pub token: String,
    /// Number of previously live sessions displaced by this login
    pub displaced: u64,
}

impl From<IssuedSession> for SessionCreatedResponse {
    fn from(issued: IssuedSession) -> Self {
        Self {
            session: issued.record.into(),
            token: issued.token,
            displaced: issued.displaced,
        }
    }
}

/// Liveness probe response for the current session.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

impl From<Liveness> for LivenessResponse {
    fn from(liveness: Liveness) -> Self {
        Self {
            live: liveness.live,
            session: liveness.session.map(SessionView::from),
        }
    }
}
