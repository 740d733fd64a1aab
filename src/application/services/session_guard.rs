//! Session Guard
//!
//! Enforces the single-active-session invariant at the moment a new session
//! is minted, and provides the logout and liveness operations the notifier
//! and HTTP surface build on.
//!
//! The atomicity itself lives in the store's `create_session` unit; the
//! guard adds token minting and hashing, bounded retry on transient storage
//! failures, and a self-heal backstop that repairs a double-live anomaly
//! should the store's guarantees ever be misconfigured.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};

use crate::config::SessionSettings;
use crate::domain::{InvalidationReason, Liveness, SessionRecord, SessionStore};
use crate::shared::error::AppError;

/// SHA-256 hex of an opaque bearer token. Raw tokens are never persisted;
/// every store lookup goes through this.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A freshly minted session together with its raw bearer token. The token
/// leaves the server exactly once, in this struct.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub record: SessionRecord,
    pub token: String,
    /// Previously-live sessions invalidated by this login
    pub displaced: u64,
}

/// Session guard errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("User {0} not found")]
    UnknownUser(i64),

    #[error("Malformed session token")]
    MalformedToken,

    #[error("Session TTL must be positive")]
    InvalidTtl,

    #[error("Storage error: {0}")]
    Storage(#[from] AppError),
}

/// Guard service over a session store.
pub struct SessionGuard<S: SessionStore + ?Sized> {
    store: Arc<S>,
    default_ttl: Duration,
    max_create_attempts: u32,
    retry_backoff: StdDuration,
}

impl<S: SessionStore + ?Sized> Clone for SessionGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            default_ttl: self.default_ttl,
            max_create_attempts: self.max_create_attempts,
            retry_backoff: self.retry_backoff,
        }
    }
}

impl<S: SessionStore + ?Sized> SessionGuard<S> {
    /// Create a new SessionGuard over the given store.
    pub fn new(store: Arc<S>, settings: &SessionSettings) -> Self {
        Self {
            store,
            default_ttl: Duration::seconds(settings.default_ttl_secs as i64),
            max_create_attempts: settings.max_create_attempts.max(1),
            retry_backoff: settings.retry_backoff(),
        }
    }

    /// Mint a new session for `user_id`, atomically invalidating every other
    /// live session of that user.
    ///
    /// Transient storage failures are retried with linear backoff; structural
    /// failures (unknown user) are surfaced immediately and never retried.
    /// After the call returns, the new session is the only live one for the
    /// user.
    pub async fn create_session(
        &self,
        user_id: i64,
        ttl: Option<Duration>,
    ) -> Result<IssuedSession, SessionError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(SessionError::InvalidTtl);
        }

        // Opaque token: no user data embedded, nothing to decode client-side.
        let token = format!("{}.{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let token_hash = hash_token(&token);

        let mut attempt = 0u32;
        let created = loop {
            attempt += 1;
            match self.store.create_session(user_id, &token_hash, ttl).await {
                Ok(created) => break created,
                Err(AppError::NotFound(_)) => return Err(SessionError::UnknownUser(user_id)),
                Err(e) if e.is_transient() && attempt < self.max_create_attempts => {
                    tracing::warn!(
                        user_id,
                        attempt,
                        error = %e,
                        "Transient failure creating session, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(SessionError::Storage(e)),
            }
        };

        if created.displaced > 0 {
            tracing::info!(
                user_id,
                session_id = %created.record.id,
                displaced = created.displaced,
                "New login displaced existing session"
            );
        }

        self.reconcile(user_id).await;

        Ok(IssuedSession {
            record: created.record,
            token,
            displaced: created.displaced,
        })
    }

    /// Self-heal backstop: if the store's isolation guarantees ever slip and
    /// a user ends up with more than one live session, keep the newest and
    /// invalidate the rest. Failures here are logged, not surfaced; this is
    /// not the primary correctness mechanism.
    pub async fn reconcile(&self, user_id: i64) {
        let live = match self.store.find_live_by_user(user_id).await {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Live-session audit failed");
                return;
            }
        };

        if live.len() <= 1 {
            return;
        }

        // find_live_by_user orders newest-first
        let keep = live[0].id;
        tracing::warn!(
            user_id,
            live_count = live.len(),
            keep_session = %keep,
            "Invariant anomaly: multiple live sessions, healing"
        );

        if let Err(e) = self
            .store
            .invalidate_other_live(user_id, keep, InvalidationReason::DuplicateLiveSession)
            .await
        {
            tracing::error!(user_id, error = %e, "Self-heal invalidation failed");
        }
    }

    /// Explicit logout path. Idempotent: a second call for an
    /// already-invalidated or unknown token is a no-op, not an error.
    pub async fn invalidate_session(
        &self,
        token: &str,
        reason: InvalidationReason,
    ) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::MalformedToken);
        }

        let touched = self.store.invalidate(&hash_token(token), reason).await?;
        if touched {
            tracing::info!(%reason, "Session invalidated");
        }
        Ok(())
    }

    /// Liveness verdict for a token. `live` is false when the record is
    /// missing, invalidated, or past its expiry.
    pub async fn is_live(&self, token: &str) -> Result<Liveness, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::MalformedToken);
        }

        let found = self.store.find_by_token_hash(&hash_token(token)).await?;
        Ok(match found {
            Some(record) => Liveness::of(record),
            None => Liveness::missing(),
        })
    }

    /// Extend a live session's expiry to `now + ttl`. Expiry only ever moves
    /// later. Returns `false` when the session is not live.
    pub async fn refresh_session(&self, token: &str, ttl: Duration) -> Result<bool, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::MalformedToken);
        }
        if ttl <= Duration::zero() {
            return Err(SessionError::InvalidTtl);
        }

        Ok(self
            .store
            .extend(&hash_token(token), Utc::now() + ttl)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::infrastructure::repositories::MemorySessionStore;
    use pretty_assertions::assert_eq;

    fn guard(store: Arc<MemorySessionStore>) -> SessionGuard<MemorySessionStore> {
        SessionGuard::new(
            store,
            &SessionSettings {
                default_ttl_secs: 3600,
                max_create_attempts: 3,
                retry_backoff_ms: 1,
            },
        )
    }

    #[tokio::test]
    async fn sequential_logins_leave_exactly_one_live_session() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store.clone());

        for _ in 0..5 {
            guard.create_session(1, None).await.unwrap();
        }

        let live = store.find_live_by_user(1).await.unwrap();
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_logins_leave_exactly_one_live_session() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = Arc::new(guard(store.clone()));

        let (a, b) = tokio::join!(
            guard.create_session(1, Some(Duration::hours(1))),
            guard.create_session(1, Some(Duration::hours(1))),
        );
        let a = a.unwrap();
        let b = b.unwrap();

        let live = store.find_live_by_user(1).await.unwrap();
        assert_eq!(live.len(), 1);

        // The loser carries the new-login reason.
        let loser_hash = if live[0].id == a.record.id {
            hash_token(&b.token)
        } else {
            hash_token(&a.token)
        };
        let loser = store
            .find_by_token_hash(&loser_hash)
            .await
            .unwrap()
            .unwrap();
        assert!(loser.invalidated_at.is_some());
        assert_eq!(
            loser.invalidation_reason,
            Some(InvalidationReason::NewLoginDetected)
        );
    }

    #[tokio::test]
    async fn logins_for_different_users_do_not_interfere() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store.clone());

        guard.create_session(1, None).await.unwrap();
        guard.create_session(2, None).await.unwrap();

        assert_eq!(store.find_live_by_user(1).await.unwrap().len(), 1);
        assert_eq!(store.find_live_by_user(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_user_fails_without_creating_anything() {
        let store = Arc::new(MemorySessionStore::with_known_users([1]));
        let guard = guard(store.clone());

        let err = guard.create_session(42, None).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownUser(42)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store);
        let err = guard
            .create_session(1, Some(Duration::zero()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTtl));
    }

    #[tokio::test]
    async fn invalidate_twice_is_a_noop_second_time() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store.clone());

        let issued = guard.create_session(1, None).await.unwrap();
        guard
            .invalidate_session(&issued.token, InvalidationReason::UserLogout)
            .await
            .unwrap();
        let after_first = store
            .find_by_token_hash(&hash_token(&issued.token))
            .await
            .unwrap()
            .unwrap();

        guard
            .invalidate_session(&issued.token, InvalidationReason::UserLogout)
            .await
            .unwrap();
        let after_second = store
            .find_by_token_hash(&hash_token(&issued.token))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(after_first.invalidated_at, after_second.invalidated_at);
        assert_eq!(
            after_second.invalidation_reason,
            Some(InvalidationReason::UserLogout)
        );
    }

    #[tokio::test]
    async fn is_live_distinguishes_missing_invalidated_and_expired() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store.clone());

        assert!(!guard.is_live("no-such-token").await.unwrap().live);

        let issued = guard.create_session(1, None).await.unwrap();
        assert!(guard.is_live(&issued.token).await.unwrap().live);

        store.expire_now(&hash_token(&issued.token));
        let verdict = guard.is_live(&issued.token).await.unwrap();
        assert!(!verdict.live);
        assert!(verdict.session.unwrap().is_expired());
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_synchronously() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store);
        assert!(matches!(
            guard.is_live("  ").await,
            Err(SessionError::MalformedToken)
        ));
        assert!(matches!(
            guard
                .invalidate_session("", InvalidationReason::UserLogout)
                .await,
            Err(SessionError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn reconcile_keeps_only_the_newest_live_session() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store.clone());

        // Fabricate the anomaly the backstop exists for: two live rows.
        let mut older = SessionRecord::new(1, "hash-old".into(), Duration::hours(1));
        older.created_at = Utc::now() - Duration::minutes(10);
        store.insert_raw(older);
        let newer = SessionRecord::new(1, "hash-new".into(), Duration::hours(1));
        let newest_id = newer.id;
        store.insert_raw(newer);

        guard.reconcile(1).await;

        let live = store.find_live_by_user(1).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, newest_id);

        let healed = store.find_by_token_hash("hash-old").await.unwrap().unwrap();
        assert_eq!(
            healed.invalidation_reason,
            Some(InvalidationReason::DuplicateLiveSession)
        );
    }

    #[tokio::test]
    async fn refresh_extends_but_never_shortens() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = guard(store.clone());

        let issued = guard.create_session(1, Some(Duration::hours(1))).await.unwrap();
        assert!(guard
            .refresh_session(&issued.token, Duration::hours(2))
            .await
            .unwrap());

        let record = store
            .find_by_token_hash(&hash_token(&issued.token))
            .await
            .unwrap()
            .unwrap();
        assert!(record.expires_at > issued.record.expires_at);

        // Refreshing an invalidated session reports not-live.
        guard
            .invalidate_session(&issued.token, InvalidationReason::UserLogout)
            .await
            .unwrap();
        assert!(!guard
            .refresh_session(&issued.token, Duration::hours(2))
            .await
            .unwrap());
    }
}
