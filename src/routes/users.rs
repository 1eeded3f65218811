use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{MovieId, Review, User},
    services::auth as auth_service,
};

use super::AppState;

/// Public view of a user; never includes the password hash
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub watchlist: Vec<MovieId>,
    pub watched_movies: Vec<MovieId>,
    pub time_spent_watching_minutes: i32,
    pub joined_on: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            watchlist: user.watchlist.iter().collect(),
            watched_movies: user.watched_movies.clone(),
            time_spent_watching_minutes: user.time_spent_watching_minutes,
            joined_on: user.joined_on,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeUsernameRequest {
    pub new_username: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// A user's profile and the reviews they wrote
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<ProfileResponse>> {
    let user = auth_service::get_user(state.repo(), &username).await?;
    let reviews = state.repo().get_reviews_by_user(&user.username).await?;

    Ok(Json(ProfileResponse {
        user: UserResponse::from(&user),
        reviews,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    user.ensure_is(&username)?;
    auth_service::change_password(
        state.repo(),
        &user.username,
        &request.current_password,
        &request.new_password,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Renames the account; open sessions follow the new name
pub async fn change_username(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    Json(request): Json<ChangeUsernameRequest>,
) -> AppResult<Json<UserResponse>> {
    user.ensure_is(&username)?;
    let renamed =
        auth_service::change_username(state.repo(), &user.username, &request.new_username).await?;

    state
        .sessions
        .rename_user(&user.username, &renamed.username)
        .await;
    Ok(Json(UserResponse::from(&renamed)))
}

/// Deletes the account and ends all of its sessions
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    Json(request): Json<DeleteAccountRequest>,
) -> AppResult<StatusCode> {
    user.ensure_is(&username)?;
    auth_service::delete_account(state.repo(), &user.username, &request.password).await?;

    state.sessions.revoke_user(&user.username).await;
    Ok(StatusCode::NO_CONTENT)
}
