use chrono::{DateTime, Utc};

use super::{Movie, MovieId, UserId, Watchlist};

/// Canonical form of a username: trimmed and lower-cased
pub fn canonical_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// A registered user
///
/// Deliberately not `Serialize`: the password hash never leaves the service.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub watchlist: Watchlist,
    pub watched_movies: Vec<MovieId>,
    pub time_spent_watching_minutes: i32,
    pub joined_on: DateTime<Utc>,
}

impl User {
    /// Marks a movie as watched
    ///
    /// Does nothing if the movie was already watched. Otherwise the movie leaves
    /// the watchlist and its runtime is added to the time spent watching.
    pub fn watch_movie(&mut self, movie: &Movie) {
        if self.watched_movies.contains(&movie.id) {
            return;
        }

        self.watched_movies.push(movie.id);
        self.watchlist.remove(movie.id);

        if let Some(runtime) = movie.runtime_minutes.filter(|r| *r > 0) {
            self.time_spent_watching_minutes += runtime;
        }
    }

    /// Undoes [`User::watch_movie`]; does nothing if the movie wasn't watched
    pub fn remove_from_watched(&mut self, movie: &Movie) {
        let Some(position) = self.watched_movies.iter().position(|id| *id == movie.id) else {
            return;
        };

        self.watched_movies.remove(position);

        if let Some(runtime) = movie.runtime_minutes.filter(|r| *r > 0) {
            self.time_spent_watching_minutes -= runtime;
        }
    }

    pub fn add_to_watchlist(&mut self, movie_id: MovieId) {
        self.watchlist.add(movie_id);
    }

    pub fn remove_from_watchlist(&mut self, movie_id: MovieId) {
        self.watchlist.remove(movie_id);
    }

    pub fn has_watched(&self, movie_id: MovieId) -> bool {
        self.watched_movies.contains(&movie_id)
    }

    /// Ids of every movie on the watchlist or already watched, without duplicates
    pub fn movie_ids(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.watchlist.iter().collect();
        for id in &self.watched_movies {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

/// Registration data for a user whose password has already been hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(username: &str, password_hash: String) -> Self {
        Self {
            username: canonical_username(username),
            password_hash,
        }
    }

    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            password_hash: self.password_hash,
            watchlist: Watchlist::new(),
            watched_movies: Vec::new(),
            time_spent_watching_minutes: 0,
            joined_on: Utc::now(),
        }
    }
}
