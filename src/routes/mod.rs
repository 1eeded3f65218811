use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    search::SearchResults,
};

pub mod auth;
pub mod movies;
pub mod state;
pub mod users;
pub mod watchlist;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(movies::stats))
        // Catalog
        .route("/movies", get(movies::search).post(movies::create))
        .route("/movies/:id", get(movies::details))
        .route(
            "/movies/:id/reviews",
            get(movies::list_reviews).post(movies::create_review),
        )
        .route("/genres", get(movies::genres))
        .route("/directors", get(movies::directors))
        .route("/actors", get(movies::actors))
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/users/:username", get(users::profile).delete(users::delete))
        .route("/users/:username/password", post(users::change_password))
        .route("/users/:username/username", put(users::change_username))
        // Watching
        .route("/watchlist", get(watchlist::list))
        .route(
            "/watchlist/:movie_id",
            post(watchlist::add).delete(watchlist::remove),
        )
        .route(
            "/watched/:movie_id",
            post(watchlist::watch).delete(watchlist::unwatch),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// One-based `page` and optional `size` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

/// Shifts a zero-based result page to the one-based numbering of the API
fn one_based<T>(mut results: SearchResults<T>) -> SearchResults<T> {
    results.page += 1;
    results
}
