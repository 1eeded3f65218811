//! Synthetic user activity for demo catalogs
//!
//! Each simulated user puts a random selection of distinct movies on their
//! watchlist, watches some of them and reviews some of those.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};

use crate::{
    error::{AppError, AppResult},
    models::{Movie, NewReview, NewUser},
    repository::Repository,
    search::{MovieQuery, PageRequest},
};

use super::auth;

/// Accounts with known credentials, added alongside the simulated users
pub const DEMO_USERS: [&str; 2] = ["testuser", "testuser2"];
pub const DEMO_PASSWORD: &str = "test123A";

const WORDS: &[&str] = &[
    "amber", "anchor", "atlas", "banner", "basil", "beacon", "birch", "blossom", "bramble",
    "breeze", "cactus", "candle", "canyon", "cedar", "cinder", "clover", "comet", "coral",
    "cricket", "dawn", "delta", "ember", "falcon", "fern", "fjord", "flint", "galaxy", "garnet",
    "glacier", "harbor", "hazel", "heron", "horizon", "indigo", "island", "ivory", "jasper",
    "juniper", "kestrel", "lagoon", "lantern", "lemon", "marble", "meadow", "meteor", "mist",
    "nectar", "nimbus", "oasis", "onyx", "orchid", "otter", "pebble", "pepper", "pine", "plume",
    "prairie", "quartz", "quill", "raven", "reef", "ripple", "river", "saffron", "sage", "shadow",
    "sierra", "spruce", "summit", "tempest", "thistle", "thunder", "tundra", "velvet", "violet",
    "willow", "winter", "zephyr",
];

/// How many users to simulate and how many movies each one picks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParams {
    pub users: usize,
    pub min_movies: usize,
    /// Defaults to the whole catalog
    pub max_movies: Option<usize>,
}

impl SimulationParams {
    pub fn validate(&self) -> AppResult<()> {
        if self.users == 0 {
            return Err(AppError::InvalidInput(
                "Number of simulated users must be greater than zero".to_string(),
            ));
        }

        if let Some(max) = self.max_movies {
            if max < self.min_movies {
                return Err(AppError::InvalidInput(format!(
                    "Maximum movies per user ({}) is below the minimum ({})",
                    max, self.min_movies
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    pub usernames: Vec<String>,
    pub watched: usize,
    pub reviews: usize,
}

fn random_words(rng: &mut StdRng, min: usize, max: usize, separator: &str) -> String {
    let count = rng.random_range(min..=max);
    (0..count)
        .filter_map(|_| WORDS.choose(&mut *rng).copied())
        .collect::<Vec<_>>()
        .join(separator)
}

/// A random instant between January 1st of `release_year` and `now`
fn review_timestamp(rng: &mut StdRng, release_year: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    let released = Utc
        .with_ymd_and_hms(release_year, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);

    let span = (now - released).num_milliseconds();
    if span <= 0 {
        return now;
    }
    now - Duration::milliseconds(rng.random_range(0..=span))
}

async fn all_movies(repo: &dyn Repository) -> AppResult<Vec<Movie>> {
    let query = MovieQuery::all();
    let total = repo.count_movies(&query).await?;
    repo.get_movies(&query, PageRequest::new(0, total.max(1))?).await
}

/// Registers a user under a fresh random name
async fn add_random_user(repo: &dyn Repository, rng: &mut StdRng) -> AppResult<String> {
    loop {
        let username = random_words(rng, 1, 4, "");
        if username.len() < auth::MIN_USERNAME_LENGTH || repo.get_user(&username).await?.is_some() {
            continue;
        }

        let password = format!("{}{}", random_words(rng, 2, 2, ""), rng.random_range(10..100u32));
        let user = repo
            .add_user(NewUser::new(&username, auth::hash_password(&password)?))
            .await?;
        return Ok(user.username);
    }
}

/// Populates the repository with simulated users, watchlists and reviews
///
/// The same `seed` over the same catalog produces the same activity, apart
/// from timestamps, which are relative to now.
pub async fn simulate(
    repo: &dyn Repository,
    params: SimulationParams,
    seed: Option<u64>,
) -> AppResult<SimulationSummary> {
    params.validate()?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let movies = all_movies(repo).await?;
    let upper_bound = params
        .max_movies
        .unwrap_or(movies.len())
        .min(movies.len());
    let lower_bound = params.min_movies.min(upper_bound);
    let now = Utc::now();
    let mut summary = SimulationSummary::default();

    for _ in 0..params.users {
        let username = add_random_user(repo, &mut rng).await?;

        let amount = rng.random_range(lower_bound..=upper_bound);
        let picked: Vec<&Movie> = rand::seq::index::sample(&mut rng, movies.len(), amount)
            .into_iter()
            .map(|i| &movies[i])
            .collect();

        for movie in &picked {
            repo.add_to_watchlist(&username, movie.id).await?;
        }

        let watched = rng.random_range(0..=picked.len());
        for movie in &picked[..watched] {
            repo.watch_movie(&username, movie.id).await?;
        }

        let reviewed = rng.random_range(0..=watched);
        for movie in &picked[..reviewed] {
            let text = random_words(&mut rng, 8, 32, " ");
            let rating = rng.random_range(1..=10);
            let timestamp = review_timestamp(&mut rng, movie.release_year, now);

            let review = NewReview::at(movie.id, Some(username.clone()), &text, rating, timestamp)?;
            repo.add_review(review).await?;
        }

        summary.usernames.push(username);
        summary.watched += watched;
        summary.reviews += reviewed;
    }

    tracing::info!(
        users = summary.usernames.len(),
        watched = summary.watched,
        reviews = summary.reviews,
        "Simulated user activity"
    );
    Ok(summary)
}

/// Adds the demo accounts unless they already exist
pub async fn add_demo_users(repo: &dyn Repository) -> AppResult<()> {
    for username in DEMO_USERS {
        if repo.get_user(username).await?.is_some() {
            continue;
        }
        repo.add_user(NewUser::new(username, auth::hash_password(DEMO_PASSWORD)?))
            .await?;
        tracing::info!(username, "Added demo user");
    }
    Ok(())
}
