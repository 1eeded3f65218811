use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::{MovieId, ReviewId};

pub const MIN_REVIEW_RATING: u8 = 1;
pub const MAX_REVIEW_RATING: u8 = 10;

/// A stored review of a movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: ReviewId,
    pub movie_id: MovieId,
    /// Username of the author; `None` for anonymous reviews
    pub author: Option<String>,
    pub text: String,
    pub rating: u8,
    pub timestamp: DateTime<Utc>,
}

/// A review waiting to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub movie_id: MovieId,
    pub author: Option<String>,
    pub text: String,
    pub rating: u8,
    pub timestamp: DateTime<Utc>,
}

impl NewReview {
    /// Creates a review timestamped now
    pub fn new(
        movie_id: MovieId,
        author: Option<String>,
        text: &str,
        rating: u8,
    ) -> AppResult<Self> {
        Self::at(movie_id, author, text, rating, Utc::now())
    }

    /// Creates a review with an explicit timestamp
    pub fn at(
        movie_id: MovieId,
        author: Option<String>,
        text: &str,
        rating: u8,
        timestamp: DateTime<Utc>,
    ) -> AppResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput(
                "Review text cannot be empty".to_string(),
            ));
        }

        if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&rating) {
            return Err(AppError::InvalidInput(format!(
                "Rating must be between {} and {}",
                MIN_REVIEW_RATING, MAX_REVIEW_RATING
            )));
        }

        Ok(Self {
            movie_id,
            author,
            text: text.to_string(),
            rating,
            timestamp,
        })
    }

    pub fn into_review(self, id: ReviewId) -> Review {
        Review {
            id,
            movie_id: self.movie_id,
            author: self.author,
            text: self.text,
            rating: self.rating,
            timestamp: self.timestamp,
        }
    }
}
