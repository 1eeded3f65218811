use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{error::AppError, routes::AppState};

/// The user behind a valid `Authorization: Bearer <token>` header
///
/// Wrap in `Option` for routes where signing in is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub token: Uuid,
}

impl AuthUser {
    /// Fails with `Forbidden` unless this is the account named `username`
    pub fn ensure_is(&self, username: &str) -> Result<(), AppError> {
        if self.username == crate::models::user::canonical_username(username) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Cannot act on another user's account".to_string(),
            ))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing or malformed bearer token".to_string()))?;

        let username = state
            .sessions
            .resolve(token)
            .await
            .ok_or_else(|| AppError::Unauthorized("Session expired or unknown".to_string()))?;

        Ok(Self { username, token })
    }
}
