//! Movie search and filtering.
//!
//! A [`MovieQuery`] combines a free-text query with exact-match filters:
//! a movie matches when the text fuzzily matches its searchable text, its
//! genres include every requested genre, its director is one of the requested
//! directors, and its cast includes every requested actor. Empty parts of the
//! query don't filter anything.

use serde::{Deserialize, Serialize};

use crate::models::{Actor, Director, Genre, Movie};

pub mod fuzzy;
pub mod pagination;

pub use pagination::{page_count, PageRequest, SearchResults, DEFAULT_PAGE_SIZE};

/// Search criteria over the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub directors: Vec<Director>,
    #[serde(default)]
    pub actors: Vec<Actor>,
}

impl MovieQuery {
    /// A query that matches every movie
    pub fn all() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_genres(mut self, genres: Vec<Genre>) -> Self {
        self.genres = genres;
        self
    }

    pub fn with_directors(mut self, directors: Vec<Director>) -> Self {
        self.directors = directors;
        self
    }

    pub fn with_actors(mut self, actors: Vec<Actor>) -> Self {
        self.actors = actors;
        self
    }

    /// Free-text part, trimmed; `None` when blank
    pub fn text_query(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// True when only exact-match filters apply
    pub fn is_exact_only(&self) -> bool {
        self.text_query().is_none()
    }

    /// Exact-match filters only (genres, directors, actors)
    pub fn matches_filters(&self, movie: &Movie) -> bool {
        let genres_ok = self.genres.iter().all(|g| movie.has_genre(g));

        let director_ok = self.directors.is_empty()
            || movie
                .director
                .as_ref()
                .is_some_and(|d| self.directors.contains(d));

        let actors_ok = self.actors.iter().all(|a| movie.has_actor(a));

        genres_ok && director_ok && actors_ok
    }

    /// Free-text part only
    pub fn matches_text(&self, movie: &Movie) -> bool {
        match self.text_query() {
            Some(text) => fuzzy::matches(text, &movie.searchable_text()),
            None => true,
        }
    }

    pub fn matches(&self, movie: &Movie) -> bool {
        self.matches_filters(movie) && self.matches_text(movie)
    }
}

/// Movies from `movies` matching `query`, in catalog order
///
/// `movies` need not be sorted.
pub fn filter_movies<'a>(
    movies: impl IntoIterator<Item = &'a Movie>,
    query: &MovieQuery,
) -> Vec<&'a Movie> {
    let mut matched: Vec<&Movie> = movies.into_iter().filter(|m| query.matches(m)).collect();
    matched.sort_by(|a, b| a.catalog_order(b));
    matched
}
