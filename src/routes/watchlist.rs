use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{Movie, MovieId},
    search::{PageRequest, SearchResults},
    services::watchlist::{self as watchlist_service, DEFAULT_WATCHLIST_PAGE_SIZE},
};

use super::{one_based, users::UserResponse, AppState, PageParams};

/// The caller's watchlist and watched movies; out-of-range pages are clamped
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<SearchResults<Movie>>> {
    let page = PageRequest::from_one_based(params.page, params.size, DEFAULT_WATCHLIST_PAGE_SIZE)?;
    let results = watchlist_service::user_movies(state.repo(), &user.username, page).await?;
    Ok(Json(one_based(results)))
}

pub async fn add(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<UserResponse>> {
    let user = watchlist_service::add_to_watchlist(state.repo(), &user.username, movie_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<UserResponse>> {
    let user =
        watchlist_service::remove_from_watchlist(state.repo(), &user.username, movie_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn watch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<UserResponse>> {
    let user = watchlist_service::watch_movie(state.repo(), &user.username, movie_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn unwatch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<UserResponse>> {
    let user =
        watchlist_service::remove_from_watched(state.repo(), &user.username, movie_id).await?;
    Ok(Json(UserResponse::from(&user)))
}
