/// Read-through caching for an optional [`Cache`](crate::db::Cache).
///
/// With `Some(cache)`, returns the cached value for `$key` when present;
/// otherwise awaits `$block`, queues the result for caching with `$ttl`
/// seconds to live and returns it. With `None`, simply awaits `$block`.
///
/// Must be used inside a function returning `AppResult<_>`.
///
/// ```rust,ignore
/// let genres: Vec<Genre> = cached!(self.cache.as_ref(), CacheKey::Genres, 30, self.load_genres())?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache {
            Some(cache) => {
                if let Some(cached) = cache.get_from_cache(&$key).await? {
                    Ok(cached)
                } else {
                    let value = $block.await?;
                    cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
            }
            None => $block.await,
        }
    }};
}
