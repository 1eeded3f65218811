use crate::{
    error::AppResult,
    models::{Movie, MovieId, User},
    repository::Repository,
    search::{page_count, PageRequest, SearchResults},
};

/// Movies per watchlist page unless the caller asks otherwise
pub const DEFAULT_WATCHLIST_PAGE_SIZE: usize = 2;

/// One page of the user's watchlist and watched movies
///
/// The page number is pulled back into range instead of failing, so asking
/// for page 100 of a two-page list returns the second page.
pub async fn user_movies(
    repo: &dyn Repository,
    username: &str,
    page: PageRequest,
) -> AppResult<SearchResults<Movie>> {
    let hits = repo.count_movies_for_user(username).await?;
    let page = page.clamped(hits);
    let movies = repo.get_movies_for_user(username, page).await?;

    Ok(SearchResults {
        movies,
        hits,
        page: page.number,
        pages: page_count(hits, page.size),
    })
}

pub async fn add_to_watchlist(repo: &dyn Repository, username: &str, movie_id: MovieId) -> AppResult<User> {
    let user = repo.add_to_watchlist(username, movie_id).await?;
    tracing::debug!(username = %user.username, movie_id = %movie_id, "Added to watchlist");
    Ok(user)
}

pub async fn remove_from_watchlist(
    repo: &dyn Repository,
    username: &str,
    movie_id: MovieId,
) -> AppResult<User> {
    let user = repo.remove_from_watchlist(username, movie_id).await?;
    tracing::debug!(username = %user.username, movie_id = %movie_id, "Removed from watchlist");
    Ok(user)
}

pub async fn watch_movie(repo: &dyn Repository, username: &str, movie_id: MovieId) -> AppResult<User> {
    let user = repo.watch_movie(username, movie_id).await?;
    tracing::debug!(
        username = %user.username,
        movie_id = %movie_id,
        minutes = user.time_spent_watching_minutes,
        "Watched movie"
    );
    Ok(user)
}

pub async fn remove_from_watched(
    repo: &dyn Repository,
    username: &str,
    movie_id: MovieId,
) -> AppResult<User> {
    let user = repo.remove_from_watched(username, movie_id).await?;
    tracing::debug!(username = %user.username, movie_id = %movie_id, "Removed from watched");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMovie, NewUser};
    use crate::repository::{MemoryRepository, MockRepository};

    async fn repository_with_movies(count: usize) -> (MemoryRepository, Vec<Movie>) {
        let repo = MemoryRepository::new();
        repo.add_user(NewUser::new("dave", "hash".to_string())).await.unwrap();

        let mut movies = Vec::new();
        for i in 0..count {
            let mut movie = NewMovie::new(format!("Movie {}", i), 2000 + i as i32);
            movie.runtime_minutes = Some(100);
            movies.push(repo.add_movie(movie).await.unwrap());
        }
        (repo, movies)
    }

    #[tokio::test]
    async fn test_user_movies_clamps_page() {
        let (repo, movies) = repository_with_movies(3).await;
        for movie in &movies {
            add_to_watchlist(&repo, "dave", movie.id).await.unwrap();
        }

        let results = user_movies(&repo, "dave", PageRequest::new(100, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(results.hits, 3);
        assert_eq!(results.pages, 2);
        assert_eq!(results.page, 1);
        assert_eq!(results.movies, vec![movies[2].clone()]);
    }

    #[tokio::test]
    async fn test_user_movies_empty() {
        let mut repo = MockRepository::new();
        repo.expect_count_movies_for_user().returning(|_| Ok(0));
        repo.expect_get_movies_for_user()
            .withf(|_, page| page.number == 0)
            .returning(|_, _| Ok(Vec::new()));

        let results = user_movies(&repo, "dave", PageRequest::new(3, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(results, SearchResults::empty(0));
    }

    #[tokio::test]
    async fn test_watched_movies_are_listed_once() {
        let (repo, movies) = repository_with_movies(2).await;
        add_to_watchlist(&repo, "dave", movies[0].id).await.unwrap();
        add_to_watchlist(&repo, "dave", movies[1].id).await.unwrap();
        let user = watch_movie(&repo, "dave", movies[0].id).await.unwrap();

        assert_eq!(user.time_spent_watching_minutes, 100);
        assert!(!user.watchlist.contains(movies[0].id));

        let results = user_movies(&repo, "dave", PageRequest::new(0, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(results.hits, 2);

        let user = remove_from_watched(&repo, "dave", movies[0].id).await.unwrap();
        assert_eq!(user.time_spent_watching_minutes, 0);

        let user = remove_from_watchlist(&repo, "dave", movies[1].id).await.unwrap();
        assert!(user.watchlist.is_empty());
    }
}
