use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::NewMovie,
    repository::Repository,
};

/// Parses a catalog document: a JSON array of movies
pub fn parse_catalog(json: &str) -> AppResult<Vec<NewMovie>> {
    serde_json::from_str(json)
        .map_err(|e| AppError::InvalidInput(format!("Malformed catalog: {}", e)))
}

/// Imports every movie in the catalog file at `path`
///
/// Movies already in the repository (same title and release year) are left
/// untouched. Returns the number of movies in the file.
pub async fn import_catalog(repo: &dyn Repository, path: impl AsRef<Path>) -> AppResult<usize> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Internal(format!("Failed to read catalog {}: {}", path.display(), e))
    })?;

    let movies = parse_catalog(&json)?;
    let count = movies.len();
    repo.add_movies(movies).await?;

    tracing::info!(path = %path.display(), movies = count, "Imported catalog");
    Ok(count)
}
