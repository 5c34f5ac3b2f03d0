use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kurius_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, InMemoryStore, PgRecommendationStore, RecommendationStore},
    routes::{create_router, AppState},
    services::{
        providers::{
            gemini::GeminiClient, google_books::GoogleBooksClient, qloo::QlooClient,
            tmdb::TmdbClient,
        },
        RecommendationSettings,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kurius_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (cache, cache_handle) = match &config.redis_url {
        Some(url) => {
            let client = create_redis_client(url).context("Failed to create Redis client")?;
            let (cache, handle) = Cache::new(client);
            info!("Metadata cache enabled");
            (Some(cache), Some(handle))
        }
        None => {
            info!("REDIS_URL not set, metadata lookups are not cached");
            (None, None)
        }
    };

    let store: Arc<dyn RecommendationStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Arc::new(PgRecommendationStore::new(pool))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Arc::new(InMemoryStore::default())
        }
    };

    let timeout = config.http_timeout();
    let taste_graph = QlooClient::new(
        config.qloo_api_key.clone(),
        config.qloo_api_url.clone(),
        timeout,
    )?;
    let screens = TmdbClient::new(
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        cache.clone(),
        timeout,
    )?;
    let books = GoogleBooksClient::new(
        config.google_books_api_key.clone(),
        config.google_books_api_url.clone(),
        cache,
        timeout,
    )?;
    let text = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_url.clone(),
        config.gemini_model.clone(),
        timeout,
    )?;

    let settings = RecommendationSettings {
        count: config.recommendation_count,
        candidate_pool: config.candidate_pool_size,
    };

    let state = AppState::new(
        Arc::new(taste_graph),
        Arc::new(screens),
        Arc::new(books),
        Arc::new(text),
        settings,
        store,
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
