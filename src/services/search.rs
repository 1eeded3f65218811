use crate::{
    error::AppResult,
    models::{Actor, Director, Genre, Movie},
    repository::Repository,
    search::{page_count, MovieQuery, PageRequest, SearchResults},
};

/// Raw search input, with filters given by name
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
}

/// Resolves `names` against a catalog listing; `None` if any is unknown
fn resolve<T, F>(names: &[String], known: &[T], make: F) -> Option<Vec<T>>
where
    T: PartialEq,
    F: Fn(&str) -> Option<T>,
{
    names
        .iter()
        .map(|name| make(name.as_str()).filter(|item| known.contains(item)))
        .collect()
}

/// Searches the catalog and returns one page of results
///
/// Filter names that do not exist in the catalog produce an empty result
/// instead of an error.
pub async fn search_movies(
    repo: &dyn Repository,
    params: &SearchParams,
    page: PageRequest,
) -> AppResult<SearchResults<Movie>> {
    let mut query = MovieQuery::text(params.query.clone());

    if !params.genres.is_empty() {
        let known = repo.genres().await?;
        match resolve(&params.genres, &known, |name| Genre::new(name)) {
            Some(genres) => query = query.with_genres(genres),
            None => return Ok(SearchResults::empty(page.number)),
        }
    }

    if !params.directors.is_empty() {
        let known = repo.directors().await?;
        match resolve(&params.directors, &known, |name| Director::new(name)) {
            Some(directors) => query = query.with_directors(directors),
            None => return Ok(SearchResults::empty(page.number)),
        }
    }

    if !params.actors.is_empty() {
        let known = repo.actors().await?;
        match resolve(&params.actors, &known, |name| Actor::new(name)) {
            Some(actors) => query = query.with_actors(actors),
            None => return Ok(SearchResults::empty(page.number)),
        }
    }

    let hits = repo.count_movies(&query).await?;
    let movies = repo.get_movies(&query, page).await?;

    tracing::debug!(
        query = %params.query,
        hits,
        page = page.number,
        "Searched movies"
    );

    Ok(SearchResults {
        movies,
        hits,
        page: page.number,
        pages: page_count(hits, page.size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::NewMovie;
    use crate::repository::{MemoryRepository, MockRepository};

    async fn catalog() -> MemoryRepository {
        let repo = MemoryRepository::new();
        let mut guardians = NewMovie::new("Guardians of the Galaxy", 2014);
        guardians.director = Director::new("James Gunn");
        guardians.genres = vec![Genre::new("Action").unwrap(), Genre::new("Sci-Fi").unwrap()];
        guardians.actors = vec![Actor::new("Chris Pratt").unwrap()];

        let mut prometheus = NewMovie::new("Prometheus", 2012);
        prometheus.director = Director::new("Ridley Scott");
        prometheus.genres = vec![Genre::new("Sci-Fi").unwrap()];

        let mut split = NewMovie::new("Split", 2016);
        split.director = Director::new("M. Night Shyamalan");
        split.genres = vec![Genre::new("Horror").unwrap()];

        repo.add_movies(vec![guardians, prometheus, split]).await.unwrap();
        repo
    }

    fn first_page() -> PageRequest {
        PageRequest::new(0, 25).unwrap()
    }

    fn titles(results: &SearchResults<Movie>) -> Vec<&str> {
        results.movies.iter().map(|m| m.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_everything() {
        let repo = catalog().await;
        let results = search_movies(&repo, &SearchParams::default(), first_page())
            .await
            .unwrap();

        assert_eq!(results.hits, 3);
        assert_eq!(results.pages, 1);
        assert_eq!(titles(&results), vec!["Guardians of the Galaxy", "Prometheus", "Split"]);
    }

    #[tokio::test]
    async fn test_search_by_genre() {
        let repo = catalog().await;
        let params = SearchParams {
            genres: vec!["Sci-Fi".to_string()],
            ..Default::default()
        };
        let results = search_movies(&repo, &params, first_page()).await.unwrap();
        assert_eq!(titles(&results), vec!["Guardians of the Galaxy", "Prometheus"]);
    }

    #[tokio::test]
    async fn test_search_text_and_director() {
        let repo = catalog().await;
        let params = SearchParams {
            query: "galaxy".to_string(),
            directors: vec!["James Gunn".to_string(), "Ridley Scott".to_string()],
            ..Default::default()
        };
        let results = search_movies(&repo, &params, first_page()).await.unwrap();
        assert_eq!(titles(&results), vec!["Guardians of the Galaxy"]);
    }

    #[tokio::test]
    async fn test_unknown_filter_is_empty_result() {
        let repo = catalog().await;
        let params = SearchParams {
            actors: vec!["Nobody At All".to_string()],
            ..Default::default()
        };
        let results = search_movies(&repo, &params, first_page()).await.unwrap();
        assert_eq!(results, SearchResults::empty(0));
    }

    #[tokio::test]
    async fn test_unknown_genre_skips_movie_queries() {
        let mut repo = MockRepository::new();
        repo.expect_genres()
            .returning(|| Ok(vec![Genre::new("Action").unwrap()]));
        repo.expect_count_movies().never();
        repo.expect_get_movies().never();

        let params = SearchParams {
            genres: vec!["Western".to_string()],
            ..Default::default()
        };
        let results = search_movies(&repo, &params, first_page()).await.unwrap();
        assert_eq!(results.hits, 0);
        assert_eq!(results.pages, 0);
    }

    #[tokio::test]
    async fn test_page_past_the_end() {
        let repo = catalog().await;
        let page = PageRequest::new(1, 3).unwrap();
        let result = search_movies(&repo, &SearchParams::default(), page).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pages_are_counted() {
        let repo = catalog().await;
        let page = PageRequest::new(1, 2).unwrap();
        let results = search_movies(&repo, &SearchParams::default(), page).await.unwrap();
        assert_eq!(results.pages, 2);
        assert_eq!(results.page, 1);
        assert_eq!(titles(&results), vec!["Split"]);
    }
}
