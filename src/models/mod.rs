use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod movie;
pub mod review;
pub mod user;
pub mod watchlist;

pub use movie::{Movie, NewMovie};
pub use review::{NewReview, Review};
pub use user::{NewUser, User};
pub use watchlist::Watchlist;

/// Declares a database identifier newtype
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i32);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Declares a name-only catalog entity (genre, director, actor)
///
/// Names are trimmed on construction and may not be empty. Equality, ordering
/// and hashing all go through the name.
macro_rules! named_entity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl AsRef<str>) -> Option<Self> {
                let name = name.as_ref().trim();
                if name.is_empty() {
                    None
                } else {
                    Some(Self(name.to_string()))
                }
            }

            pub fn name(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(&value)
                    .ok_or_else(|| format!("{} name cannot be empty", stringify!($name)))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a stored movie
    MovieId
);
id_type!(
    /// Identifier of a registered user
    UserId
);
id_type!(
    /// Identifier of a stored review
    ReviewId
);

named_entity!(
    /// A movie genre, e.g. "Action"
    Genre
);
named_entity!(
    /// A movie director
    Director
);
named_entity!(
    /// An actor credited in a movie
    Actor
);

/// A genre together with the number of movies tagged with it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenreCount {
    pub genre: Genre,
    pub movies: usize,
}
