//! relayq API - HTTP ingestion service.
//!
//! This binary provides a thin web server that:
//! - Accepts producer submissions on `POST /enqueue`
//! - Pushes them onto the Redis queue within a short deadline
//! - Reports Redis liveness on `GET /healthz`

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relayq::shutdown::shutdown_signal;
use relayq::web::router;
use relayq::{AppState, Config, Ingestor, RedisQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("api_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        http_addr = %config.http_addr,
        redis_addr = %config.redis_addr,
        queue = %config.queue_name,
        "config_loaded"
    );

    let addr = config.listen_addr()?;
    let store = RedisQueue::new(&config.redis_addr).context("Invalid Redis address")?;
    let state = AppState::new(Ingestor::new(Arc::new(store), config.queue_name.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "api_listening");

    // Run server with graceful shutdown
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("api_shutting_down");
        })
        .await
        .context("Server error")?;

    info!("api_shutdown_complete");

    Ok(())
}
