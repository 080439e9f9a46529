//! Library API server

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_api::{
    api,
    cache::{Cache, RedisCache},
    config::{AppConfig, CacheBackendKind},
    repository::{CachePolicy, Repository},
    services::{notifications, Services},
    store::{MemoryStore, PgStore, Store},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting Library API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn Store> = if config.database.is_memory() {
        tracing::warn!("Using the in-memory store; data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        tracing::info!("Connected to database");

        store.migrate().await.context("Failed to run database migrations")?;
        tracing::info!("Database migrations completed");
        Arc::new(store)
    };

    let cache = match config.cache.backend {
        CacheBackendKind::Redis => {
            let redis = RedisCache::new(&config.redis.url)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!("Connected to Redis");
            Cache::new(Arc::new(redis))
        }
        CacheBackendKind::Memory => Cache::memory(),
    };

    let repository = Repository::new(store, cache, CachePolicy::from(&config.cache));
    let notifier = notifications::from_config(&config.email);
    let services = Services::new(repository, config.auth.clone(), notifier);

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_api={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
