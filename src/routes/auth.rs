use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppResult, middleware::AuthUser, services::auth as auth_service};

use super::{users::UserResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: Uuid,
    pub username: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user =
        auth_service::register(state.repo(), &credentials.username, &credentials.password).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Exchanges credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<LoginResponse>> {
    let user =
        auth_service::authenticate(state.repo(), &credentials.username, &credentials.password)
            .await?;
    let token = state.sessions.create(&user.username).await;

    tracing::info!(username = %user.username, "Logged in");
    Ok(Json(LoginResponse {
        token,
        username: user.username,
    }))
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> StatusCode {
    state.sessions.revoke(user.token).await;
    StatusCode::NO_CONTENT
}
