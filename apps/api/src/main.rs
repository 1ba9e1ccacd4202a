mod auth;
mod config;
mod db;
mod errors;
mod models;
mod privacy;
mod rate_limit;
mod routes;
mod state;
mod workspace;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::rate_limit::memory::InMemoryRateLimitStore;
use crate::rate_limit::redis_store::RedisRateLimitStore;
use crate::rate_limit::{Clock, RateLimitStore, RateLimiter, SystemClock};
use crate::routes::build_router;
use crate::state::AppState;
use crate::workspace::postgres::PgWorkspaceStore;

const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config).await?;
    let workspaces = Arc::new(PgWorkspaceStore::new(db));

    // Rate limiting: Redis when configured, process memory otherwise
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn RateLimitStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.clone())?;
            let redis_store = RedisRateLimitStore::connect(&client).await?;
            info!("Rate limiter backed by Redis");
            Arc::new(redis_store) as Arc<dyn RateLimitStore>
        }
        None => {
            let memory = Arc::new(InMemoryRateLimitStore::new());
            spawn_purge_task(memory.clone(), clock.clone());
            info!("Rate limiter backed by process memory");
            memory as Arc<dyn RateLimitStore>
        }
    };
    let rate_limiter = RateLimiter::new(store, clock);

    // Build app state
    let state = AppState {
        workspaces,
        rate_limiter,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to PUBLIC_BASE_URL once the web app is deployed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically drops finished windows so the in-memory map stays bounded.
fn spawn_purge_task(store: Arc<InMemoryRateLimitStore>, clock: Arc<dyn Clock>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            store.purge_expired(clock.now_ms());
        }
    });
}
