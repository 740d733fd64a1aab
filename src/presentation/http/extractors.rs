//! Custom Extractors
//!
//! Axum extractors for session token parsing.

use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Deserialize;

use crate::shared::error::AppError;

/// Opaque session token presented by the client.
///
/// Read from the `Authorization: Bearer` header, falling back to a
/// `?token=` query parameter for the watch stream (the browser
/// `EventSource` API cannot set request headers).
#[derive(Debug, Clone)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Ok(TypedHeader(Authorization(bearer))) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
        {
            let token = bearer.token().trim();
            if !token.is_empty() {
                return Ok(SessionToken(token.to_string()));
            }
        }

        if let Ok(axum::extract::Query(query)) =
            parts.extract::<axum::extract::Query<TokenQuery>>().await
        {
            if let Some(token) = query.token {
                let token = token.trim();
                if !token.is_empty() {
                    return Ok(SessionToken(token.to_string()));
                }
            }
        }

        Err(AppError::Unauthorized("Missing session token".into()))
    }
}
