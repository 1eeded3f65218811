use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::error::AppResult;

/// Keys of the catalog listings cached in Redis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Genres,
    Directors,
    Actors,
    MoviesPerGenre,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Genres => write!(f, "catalog:genres"),
            CacheKey::Directors => write!(f, "catalog:directors"),
            CacheKey::Actors => write!(f, "catalog:actors"),
            CacheKey::MoviesPerGenre => write!(f, "catalog:movies_per_genre"),
        }
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// A pending write or eviction for the background cache worker
enum CacheCommand {
    Set { key: String, value: String, ttl: u64 },
    Evict { keys: Vec<String> },
}

/// Redis-backed cache for catalog listings
///
/// Reads go straight to Redis. Writes and evictions are queued to a
/// background worker so request handlers never wait on them.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    commands: mpsc::UnboundedSender<CacheCommand>,
}

/// Stops the background cache worker after it drains queued commands
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the worker and waits until queued commands are flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task failed");
        }
    }
}

impl Cache {
    /// Creates the cache and spawns its background worker
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::worker(client, command_rx, shutdown_rx).await;
        });

        (
            Self {
                redis_client,
                commands,
            },
            CacheWriterHandle { shutdown_tx, task },
        )
    }

    async fn worker(
        client: Client,
        mut command_rx: mpsc::UnboundedReceiver<CacheCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(command) = command_rx.recv() => {
                    if let Err(e) = Self::apply(&client, command).await {
                        tracing::error!(error = %e, "Failed to apply cache command");
                    }
                }
                _ = shutdown_rx.recv() => {
                    command_rx.close();
                    let mut flushed = 0;
                    while let Some(command) = command_rx.recv().await {
                        if let Err(e) = Self::apply(&client, command).await {
                            tracing::error!(error = %e, "Failed to flush cache command during shutdown");
                        }
                        flushed += 1;
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, command: CacheCommand) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match command {
            CacheCommand::Set { key, value, ttl } => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            CacheCommand::Evict { keys } => {
                let _: () = conn.del(keys).await?;
            }
        }
        Ok(())
    }

    /// Reads and deserializes a cached value; `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })
            })
            .transpose()
    }

    /// Queues a write of `value` under `key`, expiring after `ttl` seconds
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        self.send(CacheCommand::Set {
            key: key.to_string(),
            value,
            ttl,
        });
    }

    /// Queues removal of the given keys
    pub fn evict_in_background(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }
        self.send(CacheCommand::Evict {
            keys: keys.iter().map(ToString::to_string).collect(),
        });
    }

    fn send(&self, command: CacheCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("Cache writer is gone, dropping cache command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display() {
        assert_eq!(format!("{}", CacheKey::Genres), "catalog:genres");
        assert_eq!(format!("{}", CacheKey::Directors), "catalog:directors");
        assert_eq!(format!("{}", CacheKey::Actors), "catalog:actors");
        assert_eq!(
            format!("{}", CacheKey::MoviesPerGenre),
            "catalog:movies_per_genre"
        );
    }

    #[test]
    fn test_cache_keys_are_distinct() {
        let keys = [
            CacheKey::Genres,
            CacheKey::Directors,
            CacheKey::Actors,
            CacheKey::MoviesPerGenre,
        ];
        let rendered: std::collections::HashSet<String> =
            keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(rendered.len(), keys.len());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_set_in_background_writes_to_cache() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::new(client.clone()).await;

        let value = vec!["Action".to_string(), "Drama".to_string()];
        cache.set_in_background(&CacheKey::Genres, &value, 60);
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&CacheKey::Genres).await.unwrap();
        assert_eq!(retrieved, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(CacheKey::Genres.to_string()).await.unwrap();
    }
}
