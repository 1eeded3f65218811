//! Data access for the catalog, users and reviews
//!
//! Two interchangeable implementations: [`MemoryRepository`] keeps everything
//! in process memory, [`PostgresRepository`] persists to PostgreSQL. Both honor
//! the same contract, including the search semantics in [`crate::search`].

use crate::{
    error::{AppError, AppResult},
    models::{
        Actor, Director, Genre, GenreCount, Movie, MovieId, NewMovie, NewReview, NewUser, Review,
        User,
    },
    search::{MovieQuery, PageRequest},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Repository of movies, users and reviews
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Stores a movie and returns it with its identifier
    ///
    /// If a movie with the same title and release year is already stored,
    /// nothing is written and the stored movie is returned.
    async fn add_movie(&self, movie: NewMovie) -> AppResult<Movie>;

    /// Stores several movies, skipping duplicates
    async fn add_movies(&self, movies: Vec<NewMovie>) -> AppResult<Vec<Movie>> {
        let mut stored = Vec::with_capacity(movies.len());
        for movie in movies {
            stored.push(self.add_movie(movie).await?);
        }
        Ok(stored)
    }

    /// Fetches a movie by id, failing with `NotFound` when absent
    async fn get_movie(&self, id: MovieId) -> AppResult<Movie>;

    /// Number of movies matching `query`
    async fn count_movies(&self, query: &MovieQuery) -> AppResult<usize>;

    /// One page of movies matching `query`, ordered by title then release year
    ///
    /// Requesting a page past the last one fails, except page 0 which is
    /// always available (and empty when nothing matches).
    async fn get_movies(&self, query: &MovieQuery, page: PageRequest) -> AppResult<Vec<Movie>>;

    /// All genres, sorted by name
    async fn genres(&self) -> AppResult<Vec<Genre>>;

    /// All directors, sorted by name
    async fn directors(&self) -> AppResult<Vec<Director>>;

    /// All actors, sorted by name
    async fn actors(&self) -> AppResult<Vec<Actor>>;

    /// Every genre with the number of movies tagged with it
    async fn movies_per_genre(&self) -> AppResult<Vec<GenreCount>>;

    /// Registers a user; fails with `Conflict` if the username is taken
    async fn add_user(&self, user: NewUser) -> AppResult<User>;

    /// Looks up a user by canonical username
    async fn get_user(&self, username: &str) -> AppResult<Option<User>>;

    /// Removes a user; their reviews stay, without an author
    async fn delete_user(&self, username: &str) -> AppResult<()>;

    async fn change_username(&self, username: &str, new_username: &str) -> AppResult<User>;

    async fn change_password(&self, username: &str, password_hash: String) -> AppResult<()>;

    async fn add_to_watchlist(&self, username: &str, movie_id: MovieId) -> AppResult<User>;

    async fn remove_from_watchlist(&self, username: &str, movie_id: MovieId) -> AppResult<User>;

    /// Marks a movie as watched (see [`User::watch_movie`])
    async fn watch_movie(&self, username: &str, movie_id: MovieId) -> AppResult<User>;

    async fn remove_from_watched(&self, username: &str, movie_id: MovieId) -> AppResult<User>;

    /// Number of distinct movies on the user's watchlist or already watched
    async fn count_movies_for_user(&self, username: &str) -> AppResult<usize>;

    /// One page of the user's watchlist and watched movies, in catalog order
    async fn get_movies_for_user(&self, username: &str, page: PageRequest)
        -> AppResult<Vec<Movie>>;

    /// Stores a review; the movie and the author (if any) must exist
    async fn add_review(&self, review: NewReview) -> AppResult<Review>;

    async fn count_reviews_for_movie(&self, movie_id: MovieId) -> AppResult<usize>;

    /// One page of a movie's reviews, newest first; pages past the end are empty
    async fn get_reviews_for_movie(
        &self,
        movie_id: MovieId,
        page: PageRequest,
    ) -> AppResult<Vec<Review>>;

    /// Every review written by the user, newest first
    async fn get_reviews_by_user(&self, username: &str) -> AppResult<Vec<Review>>;
}

fn user_not_found(username: &str) -> AppError {
    AppError::NotFound(format!("User '{}' not found", username))
}

fn movie_not_found(id: MovieId) -> AppError {
    AppError::NotFound(format!("Movie {} not found", id))
}

fn username_taken(username: &str) -> AppError {
    AppError::Conflict(format!("Username '{}' is already taken", username))
}
