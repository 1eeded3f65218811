use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{Actor, Director, Genre, Movie, MovieId, NewMovie, Review},
    search::{PageRequest, SearchResults},
    services::{
        movies::{self as movie_service, MovieDetails, ReviewPage, DEFAULT_REVIEW_PAGE_SIZE},
        search::{search_movies, SearchParams},
        stats::{catalog_stats, CatalogStats},
    },
};

use super::{one_based, AppState, PageParams};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    /// Comma-separated genre names
    pub genres: Option<String>,
    pub directors: Option<String>,
    pub actors: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub text: String,
    pub rating: u8,
}

fn split_names(list: Option<String>) -> Vec<String> {
    list.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn one_based_reviews(mut page: ReviewPage) -> ReviewPage {
    page.page += 1;
    page
}

/// Handler for movie search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResults<Movie>>> {
    let page = PageRequest::from_one_based(params.page, params.size, state.page_size)?;
    let params = SearchParams {
        query: params.query.unwrap_or_default(),
        genres: split_names(params.genres),
        directors: split_names(params.directors),
        actors: split_names(params.actors),
    };

    let results = search_movies(state.repo(), &params, page).await?;
    Ok(Json(one_based(results)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(movie): Json<NewMovie>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    tracing::debug!(username = %user.username, title = %movie.title, "Movie submitted");
    let movie = movie_service::add_movie(state.repo(), movie).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

/// Movie with its first page of reviews
pub async fn details(
    State(state): State<AppState>,
    Path(id): Path<MovieId>,
) -> AppResult<Json<MovieDetails>> {
    let mut details = movie_service::movie_details(state.repo(), id, DEFAULT_REVIEW_PAGE_SIZE).await?;
    details.reviews = one_based_reviews(details.reviews);
    Ok(Json(details))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<MovieId>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<ReviewPage>> {
    let page = PageRequest::from_one_based(params.page, params.size, DEFAULT_REVIEW_PAGE_SIZE)?;
    let reviews = movie_service::list_reviews(state.repo(), id, page).await?;
    Ok(Json(one_based_reviews(reviews)))
}

/// Adds a review, attributed to the caller when signed in
pub async fn create_review(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<MovieId>,
    Json(request): Json<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let author = user.as_ref().map(|u| u.username.as_str());
    let review =
        movie_service::add_review(state.repo(), id, author, &request.text, request.rating).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.repo().genres().await?))
}

pub async fn directors(State(state): State<AppState>) -> AppResult<Json<Vec<Director>>> {
    Ok(Json(state.repo().directors().await?))
}

pub async fn actors(State(state): State<AppState>) -> AppResult<Json<Vec<Actor>>> {
    Ok(Json(state.repo().actors().await?))
}

/// Catalog size and movies per genre
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<CatalogStats>> {
    Ok(Json(catalog_stats(state.repo()).await?))
}
