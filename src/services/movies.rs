use serde::Serialize;

use crate::{
    error::AppResult,
    models::{Movie, MovieId, NewMovie, NewReview, Review},
    repository::Repository,
    search::{page_count, PageRequest},
};

/// Reviews shown with a movie's details
pub const DEFAULT_REVIEW_PAGE_SIZE: usize = 10;

/// One page of a movie's reviews, newest first
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub total: usize,
    /// Zero-based page number
    pub page: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieDetails {
    pub movie: Movie,
    pub reviews: ReviewPage,
}

pub async fn get_movie(repo: &dyn Repository, id: MovieId) -> AppResult<Movie> {
    repo.get_movie(id).await
}

/// A movie together with the first page of its reviews
pub async fn movie_details(
    repo: &dyn Repository,
    id: MovieId,
    review_page_size: usize,
) -> AppResult<MovieDetails> {
    let movie = repo.get_movie(id).await?;
    let reviews = list_reviews(repo, id, PageRequest::new(0, review_page_size)?).await?;
    Ok(MovieDetails { movie, reviews })
}

pub async fn add_movie(repo: &dyn Repository, movie: NewMovie) -> AppResult<Movie> {
    let movie = repo.add_movie(movie).await?;
    tracing::info!(movie_id = %movie.id, title = %movie.title, "Added movie");
    Ok(movie)
}

/// Adds a review; `author` is `None` for anonymous reviews
pub async fn add_review(
    repo: &dyn Repository,
    movie_id: MovieId,
    author: Option<&str>,
    text: &str,
    rating: u8,
) -> AppResult<Review> {
    let review = NewReview::new(movie_id, author.map(str::to_string), text, rating)?;
    let review = repo.add_review(review).await?;

    tracing::info!(
        movie_id = %movie_id,
        review_id = %review.id,
        author = review.author.as_deref().unwrap_or("anonymous"),
        "Added review"
    );
    Ok(review)
}

/// A page of reviews; pages past the end are empty, unknown movies fail
pub async fn list_reviews(
    repo: &dyn Repository,
    movie_id: MovieId,
    page: PageRequest,
) -> AppResult<ReviewPage> {
    repo.get_movie(movie_id).await?;

    let total = repo.count_reviews_for_movie(movie_id).await?;
    let reviews = repo.get_reviews_for_movie(movie_id, page).await?;

    Ok(ReviewPage {
        reviews,
        total,
        page: page.number,
        pages: page_count(total, page.size),
    })
}
