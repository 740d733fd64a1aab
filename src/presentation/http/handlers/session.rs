//! Session Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use validator::Validate;

use crate::application::dto::request::{
    CreateSessionRequest, InvalidateParams, RefreshSessionRequest,
};
use crate::application::dto::response::{LivenessResponse, SessionCreatedResponse};
use crate::application::services::{SessionError, SessionGuard};
use crate::domain::{InvalidationReason, SessionStore};
use crate::presentation::http::extractors::SessionToken;
use crate::shared::error::AppError;
use crate::startup::AppState;

fn guard(state: &AppState) -> SessionGuard<dyn SessionStore> {
    SessionGuard::new(state.store.clone(), &state.settings.session)
}

fn map_session_error(err: SessionError) -> AppError {
    match err {
        SessionError::UnknownUser(id) => AppError::NotFound(format!("User {} not found", id)),
        SessionError::MalformedToken => AppError::Unauthorized("Malformed session token".into()),
        SessionError::InvalidTtl => AppError::Validation("TTL must be positive".into()),
        SessionError::Storage(e) => e,
    }
}

/// Create a new session for a user, displacing any existing live one
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionCreatedResponse>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ttl = body.ttl_secs.map(|s| Duration::seconds(s as i64));
    let issued = guard(&state)
        .create_session(body.user_id, ttl)
        .await
        .map_err(map_session_error)?;

    Ok((StatusCode::CREATED, Json(issued.into())))
}

/// Report liveness of the presented session
pub async fn get_current_session(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<LivenessResponse>, AppError> {
    let liveness = guard(&state)
        .is_live(token.as_str())
        .await
        .map_err(map_session_error)?;

    Ok(Json(liveness.into()))
}

/// Invalidate the presented session (logout). Idempotent.
pub async fn invalidate_current_session(
    State(state): State<AppState>,
    token: SessionToken,
    Query(params): Query<InvalidateParams>,
) -> Result<StatusCode, AppError> {
    let reason = match params.reason.as_deref() {
        None => InvalidationReason::UserLogout,
        Some(code) => InvalidationReason::from_str(code)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown reason code: {}", code)))?,
    };

    guard(&state)
        .invalidate_session(token.as_str(), reason)
        .await
        .map_err(map_session_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Extend the presented session's expiry
pub async fn refresh_current_session(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<RefreshSessionRequest>,
) -> Result<Json<LivenessResponse>, AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let guard = guard(&state);
    let ttl = body
        .ttl_secs
        .map(|s| Duration::seconds(s as i64))
        .unwrap_or_else(|| Duration::seconds(state.settings.session.default_ttl_secs as i64));

    let extended = guard
        .refresh_session(token.as_str(), ttl)
        .await
        .map_err(map_session_error)?;
    if !extended {
        return Err(AppError::Unauthorized(
            "Session is no longer live".into(),
        ));
    }

    let liveness = guard
        .is_live(token.as_str())
        .await
        .map_err(map_session_error)?;

    Ok(Json(liveness.into()))
}
