use serde::{Deserialize, Serialize};

use super::MovieId;

/// A user's ordered list of movies to watch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watchlist {
    movies: Vec<MovieId>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a movie; does nothing if it is already on the list
    pub fn add(&mut self, movie_id: MovieId) {
        if !self.movies.contains(&movie_id) {
            self.movies.push(movie_id);
        }
    }

    /// Removes a movie; does nothing if it is not on the list
    pub fn remove(&mut self, movie_id: MovieId) {
        self.movies.retain(|id| *id != movie_id);
    }

    /// Movie at the given position, if any
    pub fn get(&self, index: usize) -> Option<MovieId> {
        self.movies.get(index).copied()
    }

    pub fn first(&self) -> Option<MovieId> {
        self.get(0)
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.movies.contains(&movie_id)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = MovieId> + '_ {
        self.movies.iter().copied()
    }
}

impl FromIterator<MovieId> for Watchlist {
    fn from_iter<I: IntoIterator<Item = MovieId>>(iter: I) -> Self {
        let mut watchlist = Watchlist::new();
        for movie_id in iter {
            watchlist.add(movie_id);
        }
        watchlist
    }
}
