//! PostgreSQL SessionStore Implementation
//!
//! The create unit runs inside a transaction that first takes
//! `pg_advisory_xact_lock(user_id)`, so concurrent logins for the same user
//! serialize at the storage layer while logins for different users proceed
//! in parallel. This also keeps the invariant correct when several server
//! processes share the database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{CreatedSession, InvalidationReason, SessionRecord, SessionStore};
use crate::shared::error::AppError;

/// Postgres error code for foreign key violations.
const FK_VIOLATION: &str = "23503";

/// Database row representation matching the sessions table schema.
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: i64,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    invalidated_at: Option<DateTime<Utc>>,
    invalidation_reason: Option<String>,
}

impl SessionRow {
    /// Convert database row to domain SessionRecord.
    fn into_record(self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            user_id: self.user_id,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            invalidated_at: self.invalidated_at,
            invalidation_reason: self
                .invalidation_reason
                .as_deref()
                .and_then(InvalidationReason::from_str),
        }
    }
}

/// PostgreSQL session store implementation.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new PgSessionStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_create_error(user_id: i64, err: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some(FK_VIOLATION) {
                return AppError::NotFound(format!("User {} not found", user_id));
            }
        }
        AppError::Database(err)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        ttl: Duration,
    ) -> Result<CreatedSession, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serialize logins per user. The lock is released on commit or
        // rollback, so two racing calls commit in some order and the later
        // one observes the earlier one's row.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let displaced = sqlx::query(
            r#"
            UPDATE sessions
            SET invalidated_at = NOW(), invalidation_reason = $2
            WHERE user_id = $1 AND invalidated_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(user_id)
        .bind(InvalidationReason::NewLoginDetected.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let record = SessionRecord::new(user_id, token_hash.to_string(), ttl);

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, created_at, expires_at,
                      invalidated_at, invalidation_reason
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .bind(record.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::map_create_error(user_id, e))?;

        tx.commit().await?;

        Ok(CreatedSession {
            record: row.into_record(),
            displaced,
        })
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at,
                   invalidated_at, invalidation_reason
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record()))
    }

    async fn find_live_by_user(&self, user_id: i64) -> Result<Vec<SessionRecord>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at,
                   invalidated_at, invalidation_reason
            FROM sessions
            WHERE user_id = $1 AND invalidated_at IS NULL AND expires_at > NOW()
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_record()).collect())
    }

    async fn invalidate(
        &self,
        token_hash: &str,
        reason: InvalidationReason,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET invalidated_at = NOW(), invalidation_reason = $2
            WHERE token_hash = $1 AND invalidated_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_other_live(
        &self,
        user_id: i64,
        keep_id: Uuid,
        reason: InvalidationReason,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET invalidated_at = NOW(), invalidation_reason = $3
            WHERE user_id = $1 AND id != $2
              AND invalidated_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(user_id)
        .bind(keep_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn extend(
        &self,
        token_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        // GREATEST keeps the expiry monotonic: a refresh can never shorten
        // a session's lifetime.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET expires_at = GREATEST(expires_at, $2)
            WHERE token_hash = $1 AND invalidated_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
