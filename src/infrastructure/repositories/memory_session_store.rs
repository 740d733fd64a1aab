//! In-Memory SessionStore Implementation
//!
//! Mutex-serialized map backend with the same contract as the Postgres
//! store. Used by the test suite and for local development without a
//! database. A single lock around the map gives the create unit its
//! required atomicity.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::{CreatedSession, InvalidationReason, SessionRecord, SessionStore};
use crate::shared::error::AppError;

#[derive(Default)]
struct Inner {
    /// Sessions keyed by token hash (unique across all records)
    sessions: HashMap<String, SessionRecord>,
    /// When set, user ids outside this set fail creation structurally,
    /// mirroring the FK constraint of the Postgres schema
    known_users: Option<HashSet<i64>>,
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
    /// Remaining read operations that should fail, for exercising the
    /// notifier's transient-error tolerance
    injected_failures: AtomicU32,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict creation to a known set of users, mirroring the FK
    /// constraint enforced by Postgres.
    pub fn with_known_users(users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                known_users: Some(users.into_iter().collect()),
            }),
            injected_failures: AtomicU32::new(0),
        }
    }

    /// Make the next `n` lookups fail with a transient error.
    pub fn inject_failures(&self, n: u32) {
        self.injected_failures.store(n, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> Result<(), AppError> {
        let prev = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .unwrap_or(0);
        if prev > 0 {
            return Err(AppError::Internal("injected storage failure".into()));
        }
        Ok(())
    }

    /// Total number of records, live or not.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record verbatim, bypassing the supersede pass. Lets tests
    /// fabricate states (including invariant anomalies) that the atomic
    /// create unit would never produce.
    pub fn insert_raw(&self, record: SessionRecord) {
        self.inner
            .lock()
            .sessions
            .insert(record.token_hash.clone(), record);
    }

    /// Force a session's expiry into the past, for expiry-path tests.
    pub fn expire_now(&self, token_hash: &str) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.sessions.get_mut(token_hash) {
            record.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        ttl: Duration,
    ) -> Result<CreatedSession, AppError> {
        let mut inner = self.inner.lock();

        if let Some(known) = &inner.known_users {
            if !known.contains(&user_id) {
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
        }

        let now = Utc::now();
        let mut displaced = 0u64;
        for record in inner.sessions.values_mut() {
            if record.user_id == user_id && record.is_live() {
                record.invalidated_at = Some(now);
                record.invalidation_reason = Some(InvalidationReason::NewLoginDetected);
                displaced += 1;
            }
        }

        let record = SessionRecord::new(user_id, token_hash.to_string(), ttl);
        inner
            .sessions
            .insert(token_hash.to_string(), record.clone());

        Ok(CreatedSession { record, displaced })
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, AppError> {
        self.take_injected_failure()?;
        Ok(self.inner.lock().sessions.get(token_hash).cloned())
    }

    async fn find_live_by_user(&self, user_id: i64) -> Result<Vec<SessionRecord>, AppError> {
        let inner = self.inner.lock();
        let mut live: Vec<SessionRecord> = inner
            .sessions
            .values()
            .filter(|r| r.user_id == user_id && r.is_live())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(live)
    }

    async fn invalidate(
        &self,
        token_hash: &str,
        reason: InvalidationReason,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(token_hash) {
            Some(record) if record.is_live() => {
                record.invalidated_at = Some(Utc::now());
                record.invalidation_reason = Some(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn invalidate_other_live(
        &self,
        user_id: i64,
        keep_id: Uuid,
        reason: InvalidationReason,
    ) -> Result<u64, AppError> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let mut touched = 0u64;
        for record in inner.sessions.values_mut() {
            if record.user_id == user_id && record.id != keep_id && record.is_live() {
                record.invalidated_at = Some(now);
                record.invalidation_reason = Some(reason);
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn extend(
        &self,
        token_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(token_hash) {
            Some(record) if record.is_live() => {
                if new_expires_at > record.expires_at {
                    record.expires_at = new_expires_at;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
