//! Catalog Server
//!
//! Serves one virtual page of the combined movie/tv catalog per request.
//!
//! Usage:
//!   CATALOG_API_TOKEN=... cargo run --bin catalog-server
//!
//! Endpoints:
//!   GET /api/explore?query=&page=&movies=&tv=&people=&sort=&genres=
//!   GET /health

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_aggregator::{
    api::{create_router, AppState},
    AggregationEngine, AggregatorConfig, PageCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AggregatorConfig::from_env().context("Failed to load configuration")?;
    if config.api_token.is_none() {
        warn!("CATALOG_API_TOKEN not set; upstream calls will likely be rejected");
    }

    info!(
        base = %config.api_base_url,
        language = %config.language,
        page_size = config.page_size,
        cache_ttl_secs = config.cache_ttl_secs,
        "starting catalog server"
    );

    let cache = Arc::new(PageCache::new(config.cache_ttl()));
    let engine = Arc::new(AggregationEngine::from_config(&config, cache.clone())?);

    // Expired entries are otherwise only dropped when read again.
    let sweep_every = config.cache_ttl().max(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                info!(removed, remaining = cache.len(), "purged expired catalog pages");
            }
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState::new(engine, config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 Catalog server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "catalog_aggregator=debug,catalog_server=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
