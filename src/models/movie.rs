use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{AppError, AppResult};

use super::{Actor, Director, Genre, MovieId};

/// Earliest release year accepted into the catalog
pub const MIN_RELEASE_YEAR: i32 = 1900;

/// A movie stored in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub release_year: i32,
    pub description: Option<String>,
    pub director: Option<Director>,
    pub actors: Vec<Actor>,
    pub genres: Vec<Genre>,
    pub runtime_minutes: Option<i32>,
    pub rating: Option<f32>,
    pub votes: Option<i32>,
    pub revenue_millions: Option<f32>,
    pub metascore: Option<i32>,
}

impl Movie {
    /// Returns true when both describe the same film (same title and release year)
    pub fn same_film(&self, title: &str, release_year: i32) -> bool {
        self.title == title && self.release_year == release_year
    }

    /// Catalog ordering: title, then release year
    pub fn catalog_order(&self, other: &Movie) -> Ordering {
        self.title
            .cmp(&other.title)
            .then(self.release_year.cmp(&other.release_year))
    }

    /// Text the free-text search matches against
    ///
    /// Concatenates title, director, description, genres and actors.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str()];
        if let Some(director) = &self.director {
            parts.push(director.name());
        }
        if let Some(description) = &self.description {
            parts.push(description);
        }
        parts.extend(self.genres.iter().map(Genre::name));
        parts.extend(self.actors.iter().map(Actor::name));
        parts.join(" ")
    }

    pub fn has_genre(&self, genre: &Genre) -> bool {
        self.genres.contains(genre)
    }

    pub fn has_actor(&self, actor: &Actor) -> bool {
        self.actors.contains(actor)
    }
}

/// A movie submitted to the catalog, not yet assigned an identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewMovie {
    pub title: String,
    pub release_year: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub director: Option<Director>,
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub runtime_minutes: Option<i32>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub votes: Option<i32>,
    #[serde(default)]
    pub revenue_millions: Option<f32>,
    #[serde(default)]
    pub metascore: Option<i32>,
}

impl NewMovie {
    pub fn new(title: impl Into<String>, release_year: i32) -> Self {
        Self {
            title: title.into(),
            release_year,
            ..Default::default()
        }
    }

    /// Normalizes and validates the movie before it is stored
    ///
    /// Titles and descriptions are trimmed (a blank description becomes `None`),
    /// duplicate actors and genres are dropped keeping first occurrence.
    pub fn validate(mut self) -> AppResult<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(AppError::InvalidInput(
                "Movie title cannot be empty".to_string(),
            ));
        }

        if self.release_year < MIN_RELEASE_YEAR {
            return Err(AppError::InvalidInput(format!(
                "Release year must be at least {}",
                MIN_RELEASE_YEAR
            )));
        }

        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        if matches!(self.runtime_minutes, Some(runtime) if runtime < 1) {
            return Err(AppError::InvalidInput(
                "Runtime must be at least 1 minute".to_string(),
            ));
        }
        if matches!(self.rating, Some(rating) if !(0.0..=10.0).contains(&rating)) {
            return Err(AppError::InvalidInput(
                "Rating must be between 0 and 10".to_string(),
            ));
        }
        if matches!(self.votes, Some(votes) if votes < 0) {
            return Err(AppError::InvalidInput(
                "Votes cannot be negative".to_string(),
            ));
        }
        if matches!(self.revenue_millions, Some(revenue) if revenue < 0.0) {
            return Err(AppError::InvalidInput(
                "Revenue cannot be negative".to_string(),
            ));
        }
        if matches!(self.metascore, Some(score) if !(0..=100).contains(&score)) {
            return Err(AppError::InvalidInput(
                "Metascore must be between 0 and 100".to_string(),
            ));
        }

        dedup_in_order(&mut self.actors);
        dedup_in_order(&mut self.genres);

        Ok(self)
    }

    /// Attaches a stored identifier
    pub fn into_movie(self, id: MovieId) -> Movie {
        Movie {
            id,
            title: self.title,
            release_year: self.release_year,
            description: self.description,
            director: self.director,
            actors: self.actors,
            genres: self.genres,
            runtime_minutes: self.runtime_minutes,
            rating: self.rating,
            votes: self.votes,
            revenue_millions: self.revenue_millions,
            metascore: self.metascore,
        }
    }
}

fn dedup_in_order<T: PartialEq>(items: &mut Vec<T>) {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    *items = unique;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_movie() -> Movie {
        NewMovie {
            title: "Guardians of the Galaxy".to_string(),
            release_year: 2014,
            description: Some("A group of intergalactic criminals".to_string()),
            director: Director::new("James Gunn"),
            actors: vec![Actor::new("Chris Pratt").unwrap(), Actor::new("Vin Diesel").unwrap()],
            genres: vec![Genre::new("Action").unwrap(), Genre::new("Sci-Fi").unwrap()],
            runtime_minutes: Some(121),
            ..Default::default()
        }
        .into_movie(MovieId(1))
    }

    #[test]
    fn test_validate_trims_title_and_description() {
        let mut movie = NewMovie::new("  Moana ", 2016);
        movie.description = Some("   ".to_string());

        let movie = movie.validate().unwrap();
        assert_eq!(movie.title, "Moana");
        assert_eq!(movie.description, None);
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        let result = NewMovie::new("   ", 2016).validate();
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_early_release_year() {
        assert!(NewMovie::new("Old", 1899).validate().is_err());
        assert!(NewMovie::new("Old", 1900).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_numbers() {
        let mut movie = NewMovie::new("Moana", 2016);
        movie.runtime_minutes = Some(0);
        assert!(movie.clone().validate().is_err());

        movie.runtime_minutes = Some(107);
        movie.rating = Some(10.5);
        assert!(movie.clone().validate().is_err());

        movie.rating = Some(7.7);
        movie.metascore = Some(101);
        assert!(movie.clone().validate().is_err());

        movie.metascore = Some(81);
        movie.votes = Some(-1);
        assert!(movie.clone().validate().is_err());

        movie.votes = Some(118151);
        movie.revenue_millions = Some(-0.5);
        assert!(movie.validate().is_err());
    }

    #[test]
    fn test_validate_dedups_actors_and_genres() {
        let mut movie = NewMovie::new("Moana", 2016);
        movie.actors = vec![
            Actor::new("Auli'i Cravalho").unwrap(),
            Actor::new("Dwayne Johnson").unwrap(),
            Actor::new("Auli'i Cravalho").unwrap(),
        ];
        movie.genres = vec![Genre::new("Animation").unwrap(), Genre::new("Animation").unwrap()];

        let movie = movie.validate().unwrap();
        assert_eq!(movie.actors.len(), 2);
        assert_eq!(movie.actors[0].name(), "Auli'i Cravalho");
        assert_eq!(movie.genres.len(), 1);
    }

    #[test]
    fn test_searchable_text_includes_all_attributes() {
        let text = sample_movie().searchable_text();
        assert!(text.starts_with("Guardians of the Galaxy James Gunn"));
        assert!(text.contains("intergalactic"));
        assert!(text.contains("Sci-Fi"));
        assert!(text.ends_with("Vin Diesel"));
    }

    #[test]
    fn test_catalog_order_title_then_year() {
        let a = NewMovie::new("Dune", 1984).into_movie(MovieId(1));
        let b = NewMovie::new("Dune", 2021).into_movie(MovieId(2));
        let c = NewMovie::new("Arrival", 2016).into_movie(MovieId(3));

        assert_eq!(a.catalog_order(&b), Ordering::Less);
        assert_eq!(c.catalog_order(&a), Ordering::Less);
        assert!(a.same_film("Dune", 1984));
        assert!(!a.same_film("Dune", 2021));
    }
}
