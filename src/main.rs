use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use movie_catalog::{
    config::{Config, RepositoryKind},
    db::{self, Cache, CacheWriterHandle},
    repository::{MemoryRepository, PostgresRepository, Repository},
    routes::{create_router, AppState},
    services::{catalog, simulation, SessionStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("movie_catalog=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let (repository, cache_writer) = build_repository(&config).await?;

    seed_repository(repository.as_ref(), &config).await?;

    let state = AppState::new(repository, SessionStore::new(config.session_ttl()))
        .with_page_size(config.page_size);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn build_repository(
    config: &Config,
) -> anyhow::Result<(Arc<dyn Repository>, Option<CacheWriterHandle>)> {
    match config.repository {
        RepositoryKind::Memory => {
            tracing::info!("Using in-memory repository");
            let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
            Ok((repository, None))
        }
        RepositoryKind::Database => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await?;

            let (cache, writer) = match &config.redis_url {
                Some(url) => {
                    let (cache, writer) = Cache::new(db::create_redis_client(url)?).await;
                    (Some(cache), Some(writer))
                }
                None => (None, None),
            };

            tracing::info!(cached = cache.is_some(), "Using PostgreSQL repository");
            let repository: Arc<dyn Repository> = Arc::new(PostgresRepository::new(pool, cache));
            Ok((repository, writer))
        }
    }
}

/// Imports the configured catalog, then adds demo and simulated users
async fn seed_repository(repo: &dyn Repository, config: &Config) -> anyhow::Result<()> {
    if let Some(path) = &config.catalog_path {
        catalog::import_catalog(repo, path).await?;
    }

    simulation::add_demo_users(repo).await?;

    if config.simulated_users > 0 {
        simulation::simulate(repo, config.simulation(), config.simulation_seed).await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
