//! Session record entity and store trait.
//!
//! Maps to the `sessions` table in the database schema. A session is live
//! while `invalidated_at` is unset and `expires_at` lies in the future; the
//! store guarantees at most one live session per user at every commit
//! boundary.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Why a session stopped being live, stored alongside `invalidated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// Superseded by a newer login on another client
    NewLoginDetected,
    /// Explicit logout by the user
    UserLogout,
    /// Client-side idle monitor ended the session
    InactivityTimeout,
    /// Self-heal backstop found two live sessions and kept only the newest
    DuplicateLiveSession,
}

impl InvalidationReason {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new_login_detected" => Some(Self::NewLoginDetected),
            "user_logout" => Some(Self::UserLogout),
            "inactivity_timeout" => Some(Self::InactivityTimeout),
            "duplicate_live_session" => Some(Self::DuplicateLiveSession),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewLoginDetected => "new_login_detected",
            Self::UserLogout => "user_logout",
            Self::InactivityTimeout => "inactivity_timeout",
            Self::DuplicateLiveSession => "duplicate_live_session",
        }
    }
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents one login's session.
///
/// Maps to the `sessions` table:
/// - id: UUID PRIMARY KEY
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - token_hash: VARCHAR(64) NOT NULL UNIQUE (SHA-256 hex, raw tokens are
///   never stored)
/// - created_at: TIMESTAMPTZ NOT NULL
/// - expires_at: TIMESTAMPTZ NOT NULL (moves only later, via refresh)
/// - invalidated_at: TIMESTAMPTZ NULL (once set, never cleared)
/// - invalidation_reason: VARCHAR(40) NULL (set together with invalidated_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// UUID primary key, generated at creation
    pub id: Uuid,

    /// Owning user, an opaque foreign key into the external user store
    pub user_id: i64,

    /// SHA-256 hash of the opaque bearer token
    #[serde(skip_serializing)]
    pub token_hash: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session expires regardless of invalidation state
    pub expires_at: DateTime<Utc>,

    /// When the session was superseded or logged out (None while live)
    pub invalidated_at: Option<DateTime<Utc>>,

    /// Short code explaining the invalidation
    pub invalidation_reason: Option<InvalidationReason>,
}

impl SessionRecord {
    /// Create a new record expiring `ttl` from now.
    pub fn new(user_id: i64, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            created_at: now,
            expires_at: now + ttl,
            invalidated_at: None,
            invalidation_reason: None,
        }
    }

    /// Check whether the session is currently live (not invalidated, not
    /// expired).
    pub fn is_live(&self) -> bool {
        self.invalidated_at.is_none() && self.expires_at > Utc::now()
    }

    /// Check whether the session has been invalidated (superseded or logged
    /// out), as opposed to naturally expired.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated_at.is_some()
    }

    /// Check whether the session has passed its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Result of the store's atomic create-and-supersede unit.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    /// The newly minted record, the only live session for its user
    pub record: SessionRecord,

    /// How many previously-live sessions the unit invalidated
    pub displaced: u64,
}

/// Liveness verdict for a token, used by the notifier's polling loop.
#[derive(Debug, Clone)]
pub struct Liveness {
    pub live: bool,
    pub session: Option<SessionRecord>,
}

impl Liveness {
    pub fn missing() -> Self {
        Self {
            live: false,
            session: None,
        }
    }

    pub fn of(session: SessionRecord) -> Self {
        Self {
            live: session.is_live(),
            session: Some(session),
        }
    }
}

/// Storage contract for session records.
///
/// All cross-request coordination happens here: `create_session` is the one
/// atomic unit, serialized per user inside the storage layer so that two
/// racing logins for the same user cannot both come out live. Nothing in
/// this service deletes rows; invalidated and expired sessions are retained
/// for audit.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Atomically insert a new session and invalidate every other live
    /// session of `user_id` with reason `new_login_detected`.
    ///
    /// Serialization requirement: two concurrent calls for the same user
    /// must commit in some order, and the later commit must observe and
    /// invalidate the earlier one's session. Calls for different users must
    /// not block each other.
    ///
    /// Returns a structural `NotFound` error when `user_id` does not exist
    /// in the external user store.
    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        ttl: Duration,
    ) -> Result<CreatedSession, AppError>;

    /// Look up a session by its token hash.
    async fn find_by_token_hash(&self, token_hash: &str)
        -> Result<Option<SessionRecord>, AppError>;

    /// Find all live sessions for a user (should be zero or one).
    async fn find_live_by_user(&self, user_id: i64) -> Result<Vec<SessionRecord>, AppError>;

    /// Set `invalidated_at`/`invalidation_reason` on a currently-live
    /// session. Returns `false` (not an error) when no live row matched,
    /// making the operation idempotent.
    async fn invalidate(
        &self,
        token_hash: &str,
        reason: InvalidationReason,
    ) -> Result<bool, AppError>;

    /// Invalidate every live session of `user_id` except `keep_id`.
    /// Backstop primitive for the guard's self-heal path; returns the
    /// number of rows touched.
    async fn invalidate_other_live(
        &self,
        user_id: i64,
        keep_id: Uuid,
        reason: InvalidationReason,
    ) -> Result<u64, AppError>;

    /// Extend a live session's expiry. The expiry only ever moves later;
    /// requests that would shorten it are ignored. Returns `false` when the
    /// session is not live.
    async fn extend(
        &self,
        token_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Cheap connectivity probe for the readiness endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}
