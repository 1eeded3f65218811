use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{
        user::canonical_username, Actor, Director, Genre, GenreCount, Movie, MovieId, NewMovie,
        NewReview, NewUser, Review, ReviewId, User, UserId,
    },
    search::{filter_movies, MovieQuery, PageRequest},
};

use super::{movie_not_found, user_not_found, username_taken, Repository};

/// In-process repository, used for tests and demo runs
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<MemoryRepositoryInner>>,
}

#[derive(Default)]
struct MemoryRepositoryInner {
    /// Kept in catalog order (title, then release year)
    movies: Vec<Movie>,
    genres: BTreeSet<Genre>,
    directors: BTreeSet<Director>,
    actors: BTreeSet<Actor>,
    users: HashMap<String, User>,
    reviews: Vec<Review>,
    next_movie_id: i32,
    next_user_id: i32,
    next_review_id: i32,
}

impl MemoryRepositoryInner {
    fn movie(&self, id: MovieId) -> AppResult<&Movie> {
        self.movies
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| movie_not_found(id))
    }

    fn user_mut(&mut self, username: &str) -> AppResult<&mut User> {
        self.users
            .get_mut(username)
            .ok_or_else(|| user_not_found(username))
    }

    fn user(&self, username: &str) -> AppResult<&User> {
        self.users
            .get(username)
            .ok_or_else(|| user_not_found(username))
    }

    fn movies_for_user(&self, username: &str) -> AppResult<Vec<&Movie>> {
        let ids = self.user(username)?.movie_ids();
        Ok(self.movies.iter().filter(|m| ids.contains(&m.id)).collect())
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn add_movie(&self, movie: NewMovie) -> AppResult<Movie> {
        let movie = movie.validate()?;
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .movies
            .iter()
            .find(|m| m.same_film(&movie.title, movie.release_year))
        {
            return Ok(existing.clone());
        }

        inner.next_movie_id += 1;
        let movie = movie.into_movie(MovieId(inner.next_movie_id));

        inner.genres.extend(movie.genres.iter().cloned());
        inner.actors.extend(movie.actors.iter().cloned());
        if let Some(director) = &movie.director {
            inner.directors.insert(director.clone());
        }

        let position = inner
            .movies
            .partition_point(|m| m.catalog_order(&movie).is_lt());
        inner.movies.insert(position, movie.clone());

        Ok(movie)
    }

    async fn get_movie(&self, id: MovieId) -> AppResult<Movie> {
        let inner = self.inner.read().await;
        inner.movie(id).cloned()
    }

    async fn count_movies(&self, query: &MovieQuery) -> AppResult<usize> {
        let inner = self.inner.read().await;
        Ok(filter_movies(&inner.movies, query).len())
    }

    async fn get_movies(&self, query: &MovieQuery, page: PageRequest) -> AppResult<Vec<Movie>> {
        let inner = self.inner.read().await;
        let matched = filter_movies(&inner.movies, query);
        page.ensure_within(matched.len())?;

        Ok(page.slice(&matched).iter().map(|m| (*m).clone()).collect())
    }

    async fn genres(&self) -> AppResult<Vec<Genre>> {
        Ok(self.inner.read().await.genres.iter().cloned().collect())
    }

    async fn directors(&self) -> AppResult<Vec<Director>> {
        Ok(self.inner.read().await.directors.iter().cloned().collect())
    }

    async fn actors(&self) -> AppResult<Vec<Actor>> {
        Ok(self.inner.read().await.actors.iter().cloned().collect())
    }

    async fn movies_per_genre(&self) -> AppResult<Vec<GenreCount>> {
        let inner = self.inner.read().await;
        Ok(inner
            .genres
            .iter()
            .map(|genre| GenreCount {
                genre: genre.clone(),
                movies: inner.movies.iter().filter(|m| m.has_genre(genre)).count(),
            })
            .collect())
    }

    async fn add_user(&self, user: NewUser) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.username) {
            return Err(username_taken(&user.username));
        }

        inner.next_user_id += 1;
        let user = user.into_user(UserId(inner.next_user_id));
        inner.users.insert(user.username.clone(), user.clone());

        Ok(user)
    }

    async fn get_user(&self, username: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&canonical_username(username)).cloned())
    }

    async fn delete_user(&self, username: &str) -> AppResult<()> {
        let username = canonical_username(username);
        let mut inner = self.inner.write().await;
        if inner.users.remove(&username).is_none() {
            return Err(user_not_found(&username));
        }

        for review in inner
            .reviews
            .iter_mut()
            .filter(|r| r.author.as_deref() == Some(username.as_str()))
        {
            review.author = None;
        }

        Ok(())
    }

    async fn change_username(&self, username: &str, new_username: &str) -> AppResult<User> {
        let username = canonical_username(username);
        let new_username = canonical_username(new_username);
        let mut inner = self.inner.write().await;

        if new_username != username && inner.users.contains_key(&new_username) {
            return Err(username_taken(&new_username));
        }

        let mut user = inner
            .users
            .remove(&username)
            .ok_or_else(|| user_not_found(&username))?;
        user.username = new_username.clone();
        inner.users.insert(new_username.clone(), user.clone());

        for review in inner
            .reviews
            .iter_mut()
            .filter(|r| r.author.as_deref() == Some(username.as_str()))
        {
            review.author = Some(new_username.clone());
        }

        Ok(user)
    }

    async fn change_password(&self, username: &str, password_hash: String) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.user_mut(&canonical_username(username))?.password_hash = password_hash;
        Ok(())
    }

    async fn add_to_watchlist(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        inner.movie(movie_id)?;
        let user = inner.user_mut(&canonical_username(username))?;
        user.add_to_watchlist(movie_id);
        Ok(user.clone())
    }

    async fn remove_from_watchlist(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        inner.movie(movie_id)?;
        let user = inner.user_mut(&canonical_username(username))?;
        user.remove_from_watchlist(movie_id);
        Ok(user.clone())
    }

    async fn watch_movie(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        let movie = inner.movie(movie_id)?.clone();
        let user = inner.user_mut(&canonical_username(username))?;
        user.watch_movie(&movie);
        Ok(user.clone())
    }

    async fn remove_from_watched(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        let movie = inner.movie(movie_id)?.clone();
        let user = inner.user_mut(&canonical_username(username))?;
        user.remove_from_watched(&movie);
        Ok(user.clone())
    }

    async fn count_movies_for_user(&self, username: &str) -> AppResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner.movies_for_user(&canonical_username(username))?.len())
    }

    async fn get_movies_for_user(
        &self,
        username: &str,
        page: PageRequest,
    ) -> AppResult<Vec<Movie>> {
        let inner = self.inner.read().await;
        let movies = inner.movies_for_user(&canonical_username(username))?;
        Ok(page.slice(&movies).iter().map(|m| (*m).clone()).collect())
    }

    async fn add_review(&self, review: NewReview) -> AppResult<Review> {
        let mut inner = self.inner.write().await;
        inner.movie(review.movie_id)?;

        let review = NewReview {
            author: review.author.as_deref().map(canonical_username),
            ..review
        };
        if let Some(author) = &review.author {
            inner.user(author)?;
        }

        inner.next_review_id += 1;
        let review = review.into_review(ReviewId(inner.next_review_id));
        inner.reviews.push(review.clone());

        Ok(review)
    }

    async fn count_reviews_for_movie(&self, movie_id: MovieId) -> AppResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner.reviews.iter().filter(|r| r.movie_id == movie_id).count())
    }

    async fn get_reviews_for_movie(
        &self,
        movie_id: MovieId,
        page: PageRequest,
    ) -> AppResult<Vec<Review>> {
        let inner = self.inner.read().await;
        let mut reviews: Vec<&Review> = inner
            .reviews
            .iter()
            .filter(|r| r.movie_id == movie_id)
            .collect();
        reviews.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(page.slice(&reviews).iter().map(|r| (*r).clone()).collect())
    }

    async fn get_reviews_by_user(&self, username: &str) -> AppResult<Vec<Review>> {
        let username = canonical_username(username);
        let inner = self.inner.read().await;
        let mut reviews: Vec<Review> = inner
            .reviews
            .iter()
            .filter(|r| r.author.as_deref() == Some(username.as_str()))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(reviews)
    }
}
