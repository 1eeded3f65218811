use serde::Serialize;

use crate::{
    error::AppResult,
    models::GenreCount,
    repository::Repository,
    search::MovieQuery,
};

/// Catalog overview shown on the home page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogStats {
    pub movies: usize,
    pub genres: Vec<GenreCount>,
}

pub async fn catalog_stats(repo: &dyn Repository) -> AppResult<CatalogStats> {
    let movies = repo.count_movies(&MovieQuery::all()).await?;
    let genres = repo.movies_per_genre().await?;
    Ok(CatalogStats { movies, genres })
}
