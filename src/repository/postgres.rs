use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        user::canonical_username, Actor, Director, Genre, GenreCount, Movie, MovieId, NewMovie,
        NewReview, NewUser, Review, ReviewId, User, UserId, Watchlist,
    },
    search::{MovieQuery, PageRequest},
};

use super::{movie_not_found, user_not_found, username_taken, Repository};

/// Seconds the genre/director/actor listings stay cached
const LISTING_CACHE_TTL: u64 = 30;

/// Keys invalidated whenever a movie is added
const LISTING_KEYS: [CacheKey; 4] = [
    CacheKey::Genres,
    CacheKey::Directors,
    CacheKey::Actors,
    CacheKey::MoviesPerGenre,
];

const MOVIE_COLUMNS: &str = "id, title, release_year, description, director, runtime_minutes, \
                             rating, votes, revenue_millions, metascore";

const REVIEW_COLUMNS: &str = "r.id, r.movie_id, u.username AS author, r.review_text, r.rating, \
                              r.created_at";

/// Catalog ordering; byte-wise like the in-memory repository
const CATALOG_ORDER: &str = r#" ORDER BY m.title COLLATE "C", m.release_year"#;

/// PostgreSQL-backed repository
///
/// Exact-match filters run in SQL. Free-text matching needs the fuzzy
/// scorer, so text queries fetch the SQL-filtered candidates and score them
/// in process before paging.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    cache: Option<Cache>,
}

#[derive(FromRow)]
struct MovieRow {
    id: MovieId,
    title: String,
    release_year: i32,
    description: Option<String>,
    director: Option<String>,
    runtime_minutes: Option<i32>,
    rating: Option<f32>,
    votes: Option<i32>,
    revenue_millions: Option<f32>,
    metascore: Option<i32>,
}

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    password_hash: String,
    time_spent_watching_minutes: i32,
    joined_on: DateTime<Utc>,
}

#[derive(FromRow)]
struct ReviewRow {
    id: ReviewId,
    movie_id: MovieId,
    author: Option<String>,
    review_text: String,
    rating: i16,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> AppResult<Self> {
        let rating = u8::try_from(row.rating)
            .map_err(|_| AppError::Internal(format!("Stored rating {} out of range", row.rating)))?;

        Ok(Review {
            id: row.id,
            movie_id: row.movie_id,
            author: row.author,
            text: row.review_text,
            rating,
            timestamp: row.created_at,
        })
    }
}

fn names<T: AsRef<str>>(items: impl IntoIterator<Item = T>) -> Vec<String> {
    items.into_iter().map(|i| i.as_ref().to_string()).collect()
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Appends the exact-match part of `query` as WHERE clauses over `movies m`
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &MovieQuery) {
    builder.push(" WHERE TRUE");

    if !query.directors.is_empty() {
        builder
            .push(" AND m.director = ANY(")
            .push_bind(names(query.directors.iter().map(Director::name)))
            .push(")");
    }

    if !query.genres.is_empty() {
        let genres = names(query.genres.iter().map(Genre::name));
        let required = to_i64(genres.len());
        builder
            .push(" AND m.id IN (SELECT movie_id FROM movie_genres WHERE genre = ANY(")
            .push_bind(genres)
            .push(") GROUP BY movie_id HAVING COUNT(DISTINCT genre) = ")
            .push_bind(required)
            .push(")");
    }

    if !query.actors.is_empty() {
        let actors = names(query.actors.iter().map(Actor::name));
        let required = to_i64(actors.len());
        builder
            .push(" AND m.id IN (SELECT movie_id FROM movie_actors WHERE actor = ANY(")
            .push_bind(actors)
            .push(") GROUP BY movie_id HAVING COUNT(DISTINCT actor) = ")
            .push_bind(required)
            .push(")");
    }
}

impl PostgresRepository {
    pub fn new(pool: PgPool, cache: Option<Cache>) -> Self {
        Self { pool, cache }
    }

    /// Loads full movies (with genres and actors) in the order of `ids`
    async fn hydrate(&self, ids: &[i32]) -> AppResult<Vec<Movie>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<MovieRow> =
            sqlx::query_as(&format!("SELECT {} FROM movies WHERE id = ANY($1)", MOVIE_COLUMNS))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        let genre_rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT movie_id, genre FROM movie_genres WHERE movie_id = ANY($1) ORDER BY movie_id, position",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let actor_rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT movie_id, actor FROM movie_actors WHERE movie_id = ANY($1) ORDER BY movie_id, position",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i32, Vec<Genre>> = HashMap::new();
        for (movie_id, name) in genre_rows {
            genres.entry(movie_id).or_default().extend(Genre::new(name));
        }

        let mut actors: HashMap<i32, Vec<Actor>> = HashMap::new();
        for (movie_id, name) in actor_rows {
            actors.entry(movie_id).or_default().extend(Actor::new(name));
        }

        let mut by_id: HashMap<i32, Movie> = rows
            .into_iter()
            .map(|row| {
                let id = row.id.0;
                let movie = Movie {
                    id: row.id,
                    title: row.title,
                    release_year: row.release_year,
                    description: row.description,
                    director: row.director.and_then(Director::new),
                    genres: genres.remove(&id).unwrap_or_default(),
                    actors: actors.remove(&id).unwrap_or_default(),
                    runtime_minutes: row.runtime_minutes,
                    rating: row.rating,
                    votes: row.votes,
                    revenue_millions: row.revenue_millions,
                    metascore: row.metascore,
                };
                (id, movie)
            })
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Ids of movies passing the exact-match filters, in catalog order
    async fn filtered_ids(&self, query: &MovieQuery, page: Option<PageRequest>) -> AppResult<Vec<i32>> {
        let mut builder = QueryBuilder::new("SELECT m.id FROM movies m");
        push_filters(&mut builder, query);
        builder.push(CATALOG_ORDER);

        if let Some(page) = page {
            builder
                .push(" LIMIT ")
                .push_bind(to_i64(page.size))
                .push(" OFFSET ")
                .push_bind(to_i64(page.offset()));
        }

        let ids: Vec<i32> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn count_filtered(&self, query: &MovieQuery) -> AppResult<usize> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM movies m");
        push_filters(&mut builder, query);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as usize)
    }

    /// Every movie matching a query that has a free-text part
    async fn text_matches(&self, query: &MovieQuery) -> AppResult<Vec<Movie>> {
        let ids = self.filtered_ids(query, None).await?;
        let mut movies = self.hydrate(&ids).await?;
        movies.retain(|m| query.matches_text(m));

        tracing::debug!(
            candidates = ids.len(),
            matched = movies.len(),
            "Scored free-text search candidates"
        );
        Ok(movies)
    }

    async fn stored_movie_id(&self, title: &str, release_year: i32) -> AppResult<Option<MovieId>> {
        let id = sqlx::query_scalar("SELECT id FROM movies WHERE title = $1 AND release_year = $2")
            .bind(title)
            .bind(release_year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn ensure_movie(&self, id: MovieId) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM movies WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Ok(())
        } else {
            Err(movie_not_found(id))
        }
    }

    async fn user_id(&self, username: &str) -> AppResult<UserId> {
        sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| user_not_found(username))
    }

    async fn load_user(&self, username: &str) -> AppResult<User> {
        self.get_user(username)
            .await?
            .ok_or_else(|| user_not_found(username))
    }

    async fn load_names(&self, sql: &str) -> AppResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(sql).fetch_all(&self.pool).await?;
        Ok(names)
    }

    async fn load_genres(&self) -> AppResult<Vec<Genre>> {
        let names = self
            .load_names(r#"SELECT name FROM genres ORDER BY name COLLATE "C""#)
            .await?;
        Ok(names.into_iter().filter_map(Genre::new).collect())
    }

    async fn load_directors(&self) -> AppResult<Vec<Director>> {
        let names = self
            .load_names(r#"SELECT name FROM directors ORDER BY name COLLATE "C""#)
            .await?;
        Ok(names.into_iter().filter_map(Director::new).collect())
    }

    async fn load_actors(&self) -> AppResult<Vec<Actor>> {
        let names = self
            .load_names(r#"SELECT name FROM actors ORDER BY name COLLATE "C""#)
            .await?;
        Ok(names.into_iter().filter_map(Actor::new).collect())
    }

    async fn load_movies_per_genre(&self) -> AppResult<Vec<GenreCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT g.name, COUNT(mg.movie_id)
            FROM genres g
            LEFT JOIN movie_genres mg ON mg.genre = g.name
            GROUP BY g.name
            ORDER BY g.name COLLATE "C"
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(name, count)| {
                Genre::new(name).map(|genre| GenreCount {
                    genre,
                    movies: count as usize,
                })
            })
            .collect())
    }

    /// Adjusts the user's watching time by the movie's runtime, if it has one
    async fn adjust_time_spent(
        conn: &mut sqlx::PgConnection,
        user_id: UserId,
        movie_id: MovieId,
        sign: i32,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET time_spent_watching_minutes = time_spent_watching_minutes
                + $3 * COALESCE((SELECT runtime_minutes FROM movies WHERE id = $2 AND runtime_minutes > 0), 0)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .bind(sign)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    async fn add_movie(&self, movie: NewMovie) -> AppResult<Movie> {
        let movie = movie.validate()?;

        if let Some(id) = self.stored_movie_id(&movie.title, movie.release_year).await? {
            return self.get_movie(id).await;
        }

        let mut tx = self.pool.begin().await?;

        if let Some(director) = &movie.director {
            sqlx::query("INSERT INTO directors (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(director.name())
                .execute(&mut *tx)
                .await?;
        }
        for genre in &movie.genres {
            sqlx::query("INSERT INTO genres (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(genre.name())
                .execute(&mut *tx)
                .await?;
        }
        for actor in &movie.actors {
            sqlx::query("INSERT INTO actors (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(actor.name())
                .execute(&mut *tx)
                .await?;
        }

        // A concurrent insert of the same title and year wins the conflict
        let inserted: Option<MovieId> = sqlx::query_scalar(
            r#"
            INSERT INTO movies
                (title, release_year, description, director, runtime_minutes, rating, votes,
                 revenue_millions, metascore)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (title, release_year) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&movie.title)
        .bind(movie.release_year)
        .bind(&movie.description)
        .bind(movie.director.as_ref().map(Director::name))
        .bind(movie.runtime_minutes)
        .bind(movie.rating)
        .bind(movie.votes)
        .bind(movie.revenue_millions)
        .bind(movie.metascore)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = inserted else {
            tx.rollback().await?;
            let id = self
                .stored_movie_id(&movie.title, movie.release_year)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!("Movie '{}' vanished after a conflict", movie.title))
                })?;
            return self.get_movie(id).await;
        };

        for (position, genre) in movie.genres.iter().enumerate() {
            sqlx::query("INSERT INTO movie_genres (movie_id, genre, position) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(genre.name())
                .bind(position as i32)
                .execute(&mut *tx)
                .await?;
        }
        for (position, actor) in movie.actors.iter().enumerate() {
            sqlx::query("INSERT INTO movie_actors (movie_id, actor, position) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(actor.name())
                .bind(position as i32)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if let Some(cache) = &self.cache {
            cache.evict_in_background(&LISTING_KEYS);
        }

        tracing::debug!(movie_id = %id, title = %movie.title, "Stored movie");
        Ok(movie.into_movie(id))
    }

    async fn get_movie(&self, id: MovieId) -> AppResult<Movie> {
        self.hydrate(&[id.0])
            .await?
            .pop()
            .ok_or_else(|| movie_not_found(id))
    }

    async fn count_movies(&self, query: &MovieQuery) -> AppResult<usize> {
        if query.is_exact_only() {
            self.count_filtered(query).await
        } else {
            Ok(self.text_matches(query).await?.len())
        }
    }

    async fn get_movies(&self, query: &MovieQuery, page: PageRequest) -> AppResult<Vec<Movie>> {
        if query.is_exact_only() {
            let total = self.count_filtered(query).await?;
            page.ensure_within(total)?;

            let ids = self.filtered_ids(query, Some(page)).await?;
            return self.hydrate(&ids).await;
        }

        let movies = self.text_matches(query).await?;
        page.ensure_within(movies.len())?;
        Ok(page.slice(&movies).to_vec())
    }

    async fn genres(&self) -> AppResult<Vec<Genre>> {
        cached!(self.cache.as_ref(), CacheKey::Genres, LISTING_CACHE_TTL, self.load_genres())
    }

    async fn directors(&self) -> AppResult<Vec<Director>> {
        cached!(self.cache.as_ref(), CacheKey::Directors, LISTING_CACHE_TTL, self.load_directors())
    }

    async fn actors(&self) -> AppResult<Vec<Actor>> {
        cached!(self.cache.as_ref(), CacheKey::Actors, LISTING_CACHE_TTL, self.load_actors())
    }

    async fn movies_per_genre(&self) -> AppResult<Vec<GenreCount>> {
        cached!(
            self.cache.as_ref(),
            CacheKey::MoviesPerGenre,
            LISTING_CACHE_TTL,
            self.load_movies_per_genre()
        )
    }

    async fn add_user(&self, user: NewUser) -> AppResult<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash, joined_on)
            VALUES ($1, $2, now())
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash, time_spent_watching_minutes, joined_on
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| username_taken(&user.username))?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            watchlist: Watchlist::new(),
            watched_movies: Vec::new(),
            time_spent_watching_minutes: row.time_spent_watching_minutes,
            joined_on: row.joined_on,
        })
    }

    async fn get_user(&self, username: &str) -> AppResult<Option<User>> {
        let username = canonical_username(username);
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, time_spent_watching_minutes, joined_on
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(&username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let watchlist: Vec<MovieId> = sqlx::query_scalar(
            "SELECT movie_id FROM user_watchlist WHERE user_id = $1 ORDER BY added_seq",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let watched_movies: Vec<MovieId> = sqlx::query_scalar(
            "SELECT movie_id FROM user_watched WHERE user_id = $1 ORDER BY added_seq",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            watchlist: watchlist.into_iter().collect(),
            watched_movies,
            time_spent_watching_minutes: row.time_spent_watching_minutes,
            joined_on: row.joined_on,
        }))
    }

    async fn delete_user(&self, username: &str) -> AppResult<()> {
        let username = canonical_username(username);
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(&username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(&username));
        }
        Ok(())
    }

    async fn change_username(&self, username: &str, new_username: &str) -> AppResult<User> {
        let username = canonical_username(username);
        let new_username = canonical_username(new_username);

        if new_username != username && self.get_user(&new_username).await?.is_some() {
            return Err(username_taken(&new_username));
        }

        let result = sqlx::query("UPDATE users SET username = $2 WHERE username = $1")
            .bind(&username)
            .bind(&new_username)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    username_taken(&new_username)
                }
                other => AppError::Database(other),
            })?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(&username));
        }
        self.load_user(&new_username).await
    }

    async fn change_password(&self, username: &str, password_hash: String) -> AppResult<()> {
        let username = canonical_username(username);
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE username = $1")
            .bind(&username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(&username));
        }
        Ok(())
    }

    async fn add_to_watchlist(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let username = canonical_username(username);
        self.ensure_movie(movie_id).await?;
        let user_id = self.user_id(&username).await?;

        sqlx::query(
            "INSERT INTO user_watchlist (user_id, movie_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await?;

        self.load_user(&username).await
    }

    async fn remove_from_watchlist(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let username = canonical_username(username);
        self.ensure_movie(movie_id).await?;
        let user_id = self.user_id(&username).await?;

        sqlx::query("DELETE FROM user_watchlist WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        self.load_user(&username).await
    }

    async fn watch_movie(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let username = canonical_username(username);
        self.ensure_movie(movie_id).await?;
        let user_id = self.user_id(&username).await?;

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO user_watched (user_id, movie_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(movie_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            sqlx::query("DELETE FROM user_watchlist WHERE user_id = $1 AND movie_id = $2")
                .bind(user_id)
                .bind(movie_id)
                .execute(&mut *tx)
                .await?;
            Self::adjust_time_spent(&mut tx, user_id, movie_id, 1).await?;
        }
        tx.commit().await?;

        self.load_user(&username).await
    }

    async fn remove_from_watched(&self, username: &str, movie_id: MovieId) -> AppResult<User> {
        let username = canonical_username(username);
        self.ensure_movie(movie_id).await?;
        let user_id = self.user_id(&username).await?;

        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM user_watched WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 1 {
            Self::adjust_time_spent(&mut tx, user_id, movie_id, -1).await?;
        }
        tx.commit().await?;

        self.load_user(&username).await
    }

    async fn count_movies_for_user(&self, username: &str) -> AppResult<usize> {
        let user_id = self.user_id(&canonical_username(username)).await?;
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT movie_id FROM user_watchlist WHERE user_id = $1
                UNION
                SELECT movie_id FROM user_watched WHERE user_id = $1
            ) AS user_movies
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as usize)
    }

    async fn get_movies_for_user(
        &self,
        username: &str,
        page: PageRequest,
    ) -> AppResult<Vec<Movie>> {
        let user_id = self.user_id(&canonical_username(username)).await?;
        let ids: Vec<i32> = sqlx::query_scalar(&format!(
            r#"
            SELECT m.id FROM movies m
            WHERE m.id IN (
                SELECT movie_id FROM user_watchlist WHERE user_id = $1
                UNION
                SELECT movie_id FROM user_watched WHERE user_id = $1
            )
            {}
            LIMIT $2 OFFSET $3
            "#,
            CATALOG_ORDER
        ))
        .bind(user_id)
        .bind(to_i64(page.size))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(&ids).await
    }

    async fn add_review(&self, review: NewReview) -> AppResult<Review> {
        self.ensure_movie(review.movie_id).await?;

        let author = review.author.as_deref().map(canonical_username);
        let user_id = match &author {
            Some(author) => Some(self.user_id(author).await?),
            None => None,
        };

        let id: ReviewId = sqlx::query_scalar(
            r#"
            INSERT INTO reviews (movie_id, user_id, review_text, rating, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(review.movie_id)
        .bind(user_id)
        .bind(&review.text)
        .bind(i16::from(review.rating))
        .bind(review.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(NewReview { author, ..review }.into_review(id))
    }

    async fn count_reviews_for_movie(&self, movie_id: MovieId) -> AppResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE movie_id = $1")
            .bind(movie_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn get_reviews_for_movie(
        &self,
        movie_id: MovieId,
        page: PageRequest,
    ) -> AppResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM reviews r
            LEFT JOIN users u ON u.id = r.user_id
            WHERE r.movie_id = $1
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            REVIEW_COLUMNS
        ))
        .bind(movie_id)
        .bind(to_i64(page.size))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Review::try_from).collect()
    }

    async fn get_reviews_by_user(&self, username: &str) -> AppResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE u.username = $1
            ORDER BY r.created_at DESC
            "#,
            REVIEW_COLUMNS
        ))
        .bind(canonical_username(username))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Review::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MovieQuery;

    fn render(query: &MovieQuery) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT m.id FROM movies m");
        push_filters(&mut builder, query);
        builder.sql().to_string()
    }

    #[test]
    fn test_no_filters_renders_bare_where() {
        assert_eq!(render(&MovieQuery::all()), "SELECT m.id FROM movies m WHERE TRUE");
    }

    #[test]
    fn test_text_only_query_adds_no_sql() {
        assert_eq!(render(&MovieQuery::text("galaxy")), render(&MovieQuery::all()));
    }

    #[test]
    fn test_genre_filter_requires_every_genre() {
        let query = MovieQuery::all().with_genres(vec![
            Genre::new("Action").unwrap(),
            Genre::new("Adventure").unwrap(),
        ]);
        let sql = render(&query);
        assert!(sql.contains("FROM movie_genres WHERE genre = ANY($1)"));
        assert!(sql.contains("HAVING COUNT(DISTINCT genre) = $2"));
    }

    #[test]
    fn test_all_filters_bind_in_order() {
        let query = MovieQuery::all()
            .with_directors(vec![Director::new("James Gunn").unwrap()])
            .with_genres(vec![Genre::new("Action").unwrap()])
            .with_actors(vec![Actor::new("Vin Diesel").unwrap()]);
        let sql = render(&query);

        assert!(sql.contains("m.director = ANY($1)"));
        assert!(sql.contains("genre = ANY($2)"));
        assert!(sql.contains("COUNT(DISTINCT genre) = $3"));
        assert!(sql.contains("actor = ANY($4)"));
        assert!(sql.contains("COUNT(DISTINCT actor) = $5"));
    }

    #[test]
    fn test_review_row_conversion() {
        let row = ReviewRow {
            id: ReviewId(1),
            movie_id: MovieId(2),
            author: None,
            review_text: "Fine".to_string(),
            rating: 6,
            created_at: Utc::now(),
        };
        let review = Review::try_from(row).unwrap();
        assert_eq!(review.rating, 6);
        assert_eq!(review.author, None);
    }

    mod database {
        //! Runs against a throwaway database per test; needs `DATABASE_URL`
        //! pointing at a PostgreSQL server that allows creating databases.

        use super::*;
        use crate::{db::run_migrations, repository::MemoryRepository};
        use chrono::Duration;

        async fn repository(pool: PgPool) -> PostgresRepository {
            run_migrations(&pool).await.unwrap();
            PostgresRepository::new(pool, None)
        }

        fn page(number: usize, size: usize) -> PageRequest {
            PageRequest::new(number, size).unwrap()
        }

        fn movie(title: &str, year: i32, director: &str, genres: &[&str], actors: &[&str]) -> NewMovie {
            NewMovie {
                director: Director::new(director),
                genres: genres.iter().filter_map(|g| Genre::new(*g)).collect(),
                actors: actors.iter().filter_map(|a| Actor::new(*a)).collect(),
                runtime_minutes: Some(100),
                ..NewMovie::new(title, year)
            }
        }

        fn catalog() -> Vec<NewMovie> {
            vec![
                movie("Guardians", 2014, "James Gunn", &["Action", "Adventure", "Sci-Fi"], &["Chris Pratt", "Vin Diesel"]),
                movie("Prometheus", 2012, "Ridley Scott", &["Adventure", "Sci-Fi"], &["Noomi Rapace"]),
                movie("Furious 7", 2015, "James Wan", &["Action"], &["Vin Diesel"]),
                movie("Alien", 1979, "Ridley Scott", &["Horror", "Sci-Fi"], &["Sigourney Weaver"]),
            ]
        }

        async fn populated(pool: PgPool) -> PostgresRepository {
            let repo = repository(pool).await;
            repo.add_movies(catalog()).await.unwrap();
            repo
        }

        async fn with_user(pool: PgPool) -> PostgresRepository {
            let repo = populated(pool).await;
            repo.add_user(NewUser::new("username", "hash".to_string())).await.unwrap();
            repo
        }

        async fn titles(repo: &dyn Repository, query: &MovieQuery) -> Vec<String> {
            repo.get_movies(query, page(0, 25))
                .await
                .unwrap()
                .into_iter()
                .map(|m| m.title)
                .collect()
        }

        async fn first_movie(repo: &PostgresRepository) -> Movie {
            repo.get_movies(&MovieQuery::all(), page(0, 1)).await.unwrap().remove(0)
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_add_movie_round_trips(pool: PgPool) {
            let repo = repository(pool).await;
            let stored = repo.add_movies(catalog()).await.unwrap();

            let guardians = repo.get_movie(stored[0].id).await.unwrap();
            assert_eq!(guardians, stored[0]);
            assert_eq!(guardians.actors[0].name(), "Chris Pratt");
            assert_eq!(repo.count_movies(&MovieQuery::all()).await.unwrap(), 4);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_add_movie_duplicate(pool: PgPool) {
            let repo = repository(pool).await;
            let first = repo.add_movie(NewMovie::new("TestMovie", 2020)).await.unwrap();
            let second = repo.add_movie(NewMovie::new(" TestMovie ", 2020)).await.unwrap();

            assert_eq!(first.id, second.id);
            assert_eq!(repo.count_movies(&MovieQuery::all()).await.unwrap(), 1);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_concurrent_duplicate_adds_share_one_movie(pool: PgPool) {
            let repo = repository(pool).await;
            let new = || movie("Dune", 2021, "Denis Villeneuve", &["Sci-Fi"], &["Zendaya"]);

            let (first, second) = tokio::join!(repo.add_movie(new()), repo.add_movie(new()));
            let (first, second) = (first.unwrap(), second.unwrap());

            assert_eq!(first.id, second.id);
            assert_eq!(repo.count_movies(&MovieQuery::all()).await.unwrap(), 1);
            assert_eq!(repo.get_movie(first.id).await.unwrap().genres.len(), 1);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_catalog_order_matches_memory_repository(pool: PgPool) {
            let repo = repository(pool).await;
            let memory = MemoryRepository::new();
            let movies = vec![
                NewMovie::new("alpha", 2000),
                NewMovie::new("Beta", 2000),
                NewMovie::new("Alpha", 2001),
                NewMovie::new("Alpha", 1999),
                NewMovie::new("_underscore", 2000),
            ];
            repo.add_movies(movies.clone()).await.unwrap();
            memory.add_movies(movies).await.unwrap();

            let stored = repo.get_movies(&MovieQuery::all(), page(0, 10)).await.unwrap();
            let expected = memory.get_movies(&MovieQuery::all(), page(0, 10)).await.unwrap();
            let keys = |movies: &[Movie]| -> Vec<(String, i32)> {
                movies.iter().map(|m| (m.title.clone(), m.release_year)).collect()
            };

            assert_eq!(keys(&stored), keys(&expected));
            assert_eq!(stored[0].title, "Alpha");
            assert_eq!(stored[0].release_year, 1999);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_get_movies_pages(pool: PgPool) {
            let repo = populated(pool).await;

            assert_eq!(repo.get_movies(&MovieQuery::all(), page(0, 3)).await.unwrap().len(), 3);
            assert_eq!(repo.get_movies(&MovieQuery::all(), page(1, 3)).await.unwrap().len(), 1);

            let result = repo.get_movies(&MovieQuery::all(), page(2, 3)).await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_genre_filter_requires_every_genre(pool: PgPool) {
            let repo = populated(pool).await;
            let genres = |list: &[&str]| -> Vec<Genre> {
                list.iter().filter_map(|n| Genre::new(*n)).collect()
            };

            let query = MovieQuery::all().with_genres(genres(&["Adventure", "Sci-Fi"]));
            assert_eq!(titles(&repo, &query).await, vec!["Guardians", "Prometheus"]);

            let query = MovieQuery::all().with_genres(genres(&["Action", "Sci-Fi"]));
            assert_eq!(titles(&repo, &query).await, vec!["Guardians"]);
            assert_eq!(repo.count_movies(&query).await.unwrap(), 1);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_actor_and_director_filters(pool: PgPool) {
            let repo = populated(pool).await;

            let query = MovieQuery::all().with_actors(vec![Actor::new("Vin Diesel").unwrap()]);
            assert_eq!(titles(&repo, &query).await, vec!["Furious 7", "Guardians"]);

            let query = MovieQuery::all().with_actors(vec![
                Actor::new("Vin Diesel").unwrap(),
                Actor::new("Chris Pratt").unwrap(),
            ]);
            assert_eq!(titles(&repo, &query).await, vec!["Guardians"]);

            let query = MovieQuery::all().with_directors(vec![
                Director::new("Ridley Scott").unwrap(),
                Director::new("James Wan").unwrap(),
            ]);
            assert_eq!(titles(&repo, &query).await, vec!["Alien", "Furious 7", "Prometheus"]);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_text_query_with_filters(pool: PgPool) {
            let repo = populated(pool).await;

            let query = MovieQuery::text("prometheus");
            assert_eq!(titles(&repo, &query).await, vec!["Prometheus"]);

            let query = MovieQuery::text("prometheus").with_genres(vec![Genre::new("Horror").unwrap()]);
            assert!(titles(&repo, &query).await.is_empty());
            assert!(repo.get_movies(&query, page(1, 25)).await.is_err());
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_listings_and_genre_counts(pool: PgPool) {
            let repo = populated(pool).await;

            let genres: Vec<String> = names(repo.genres().await.unwrap().iter().map(Genre::name));
            assert_eq!(genres, vec!["Action", "Adventure", "Horror", "Sci-Fi"]);
            assert_eq!(repo.directors().await.unwrap().len(), 3);
            assert_eq!(repo.actors().await.unwrap().len(), 4);

            let counts = repo.movies_per_genre().await.unwrap();
            let sci_fi = counts.iter().find(|c| c.genre.name() == "Sci-Fi").unwrap();
            assert_eq!(sci_fi.movies, 3);
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_users(pool: PgPool) {
            let repo = with_user(pool).await;

            let result = repo.add_user(NewUser::new(" UserName", "other".to_string())).await;
            assert!(matches!(result, Err(AppError::Conflict(_))));

            repo.change_password("USERNAME", "new-hash".to_string()).await.unwrap();
            let user = repo.get_user("  username ").await.unwrap().unwrap();
            assert_eq!(user.password_hash, "new-hash");
            assert_eq!(repo.get_user("nobody").await.unwrap(), None);

            repo.add_user(NewUser::new("other", "hash".to_string())).await.unwrap();
            let result = repo.change_username("username", "Other").await;
            assert!(matches!(result, Err(AppError::Conflict(_))));

            let renamed = repo.change_username("username", "renamed").await.unwrap();
            assert_eq!(renamed.username, "renamed");
            assert!(repo.get_user("username").await.unwrap().is_none());
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_watch_movie_tracks_time_spent(pool: PgPool) {
            let repo = with_user(pool).await;
            let movie = first_movie(&repo).await;
            let untimed = repo.add_movie(NewMovie::new("Untimed", 2000)).await.unwrap();

            let user = repo.add_to_watchlist("username", movie.id).await.unwrap();
            assert!(user.watchlist.contains(movie.id));

            let user = repo.watch_movie("username", movie.id).await.unwrap();
            assert!(user.watchlist.is_empty());
            assert_eq!(user.watched_movies, vec![movie.id]);
            assert_eq!(user.time_spent_watching_minutes, 100);

            let user = repo.watch_movie("username", movie.id).await.unwrap();
            assert_eq!(user.time_spent_watching_minutes, 100);

            let user = repo.watch_movie("username", untimed.id).await.unwrap();
            assert_eq!(user.time_spent_watching_minutes, 100);

            let user = repo.remove_from_watched("username", movie.id).await.unwrap();
            assert_eq!(user.time_spent_watching_minutes, 0);
            let user = repo.remove_from_watched("username", movie.id).await.unwrap();
            assert_eq!(user.time_spent_watching_minutes, 0);

            let result = repo.watch_movie("username", MovieId(999)).await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_movies_for_user(pool: PgPool) {
            let repo = with_user(pool).await;
            let movies = repo.get_movies(&MovieQuery::all(), page(0, 3)).await.unwrap();
            repo.watch_movie("username", movies[2].id).await.unwrap();
            repo.add_to_watchlist("username", movies[1].id).await.unwrap();
            repo.add_to_watchlist("username", movies[0].id).await.unwrap();

            assert_eq!(repo.count_movies_for_user("username").await.unwrap(), 3);
            let first = repo.get_movies_for_user("username", page(0, 2)).await.unwrap();
            let second = repo.get_movies_for_user("username", page(1, 2)).await.unwrap();
            assert_eq!(first, movies[..2].to_vec());
            assert_eq!(second, movies[2..].to_vec());

            let user = repo.remove_from_watchlist("username", movies[0].id).await.unwrap();
            assert!(!user.watchlist.contains(movies[0].id));
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_reviews(pool: PgPool) {
            let repo = with_user(pool).await;
            let movie = first_movie(&repo).await;

            let now = Utc::now();
            let older = NewReview::at(movie.id, None, "Older", 3, now - Duration::days(1)).unwrap();
            let newer =
                NewReview::at(movie.id, Some("USERNAME".to_string()), "Newer", 8, now).unwrap();
            repo.add_review(older).await.unwrap();
            let newer = repo.add_review(newer).await.unwrap();
            assert_eq!(newer.author.as_deref(), Some("username"));

            assert_eq!(repo.count_reviews_for_movie(movie.id).await.unwrap(), 2);
            let reviews = repo.get_reviews_for_movie(movie.id, page(0, 25)).await.unwrap();
            assert_eq!(reviews[0].text, "Newer");
            assert_eq!(reviews[1].text, "Older");
            assert!(repo.get_reviews_for_movie(movie.id, page(3, 25)).await.unwrap().is_empty());

            let ghost = NewReview::new(movie.id, Some("ghost".to_string()), "Boo", 5).unwrap();
            assert!(matches!(repo.add_review(ghost).await, Err(AppError::NotFound(_))));
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires PostgreSQL"]
        async fn test_delete_user_keeps_reviews_anonymously(pool: PgPool) {
            let repo = with_user(pool).await;
            let movie = first_movie(&repo).await;
            repo.add_review(NewReview::new(movie.id, Some("username".to_string()), "Nice", 7).unwrap())
                .await
                .unwrap();
            assert_eq!(repo.get_reviews_by_user("username").await.unwrap().len(), 1);

            repo.delete_user("username").await.unwrap();

            assert!(repo.get_user("username").await.unwrap().is_none());
            let reviews = repo.get_reviews_for_movie(movie.id, page(0, 25)).await.unwrap();
            assert_eq!(reviews.len(), 1);
            assert_eq!(reviews[0].author, None);
            assert!(matches!(repo.delete_user("username").await, Err(AppError::NotFound(_))));
        }
    }
}

