//! Micro-Climate Server
//!
//! Main entry point for the webcam micro-climate pipeline.

use microclimate_server::{
    analyzer::AnalyzerParams,
    fetcher::{Fetcher, FetcherConfig},
    realtime_hub::RealtimeHub,
    result_store::{ResultStore, ResultStoreConfig},
    source_registry::SourceRegistry,
    state::{AppConfig, AppState},
    web_api,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "microclimate_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Micro-Climate Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        host = %config.host,
        port = config.port,
        redis = config.redis_url.is_some(),
        result_ttl_sec = config.result_ttl.as_secs(),
        "Configuration loaded"
    );

    // Load webcam sources; an invalid definitions file is fatal
    let registry = Arc::new(SourceRegistry::load(config.webcams_config_path.as_deref()).await?);
    tracing::info!(sources = registry.len(), "Source registry loaded");

    // Result store, with the Redis mirror when reachable
    let store = Arc::new(
        ResultStore::connect(ResultStoreConfig {
            ttl: config.result_ttl,
            redis_url: config.redis_url.clone(),
            ..ResultStoreConfig::default()
        })
        .await,
    );
    let _sweeper = store.start_sweeper(Duration::from_secs(60));

    let hub = Arc::new(RealtimeHub::new());

    // Polling pipeline
    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&hub),
        AnalyzerParams::default(),
        FetcherConfig {
            fetch_timeout: config.fetch_timeout,
            max_concurrent_fetches: config.max_concurrent_fetches,
            ..FetcherConfig::default()
        },
    )?);
    fetcher.start().await;

    let state = AppState {
        config: config.clone(),
        registry,
        store,
        hub,
        fetcher: Arc::clone(&fetcher),
    };

    let app = web_api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    fetcher.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown signal handler");
    }
    tracing::info!("Shutdown signal received");
}
