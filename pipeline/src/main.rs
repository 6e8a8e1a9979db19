//! relayq Worker - pops messages from the Redis queue and appends one record
//! per processed message to the result log.
//!
//! Run several instances against the same queue to scale out; Redis hands
//! each message to exactly one of them.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relayq::shutdown::cancel_on_signal;
use relayq::{Config, FileSink, RedisQueue, Worker, WorkerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        redis_addr = %config.redis_addr,
        queue = %config.queue_name,
        output_path = %config.output_path.display(),
        processing_delay_ms = config.processing_delay.as_millis() as u64,
        "config_loaded"
    );

    let store = RedisQueue::new(&config.redis_addr).context("Invalid Redis address")?;
    let sink = FileSink::open(&config.output_path)
        .await
        .context("Failed to prepare output path")?;

    let worker = Worker::new(
        Arc::new(store),
        Arc::new(sink),
        WorkerSettings::from_config(&config),
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    worker.run(shutdown).await;

    Ok(())
}
