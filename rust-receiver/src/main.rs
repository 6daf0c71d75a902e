//! Webhook capture worker - drains the ingestion queue.
//!
//! Consumes the payloads `capture-web` queued, processes each one in its own
//! task and acknowledges it only once processing succeeded, so delivery is
//! at-least-once.

mod consumer;
mod processor;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use capture::logging::log_filter;
use capture::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = log_filter(Config::debug_payloads_requested());
    let log_level = filter.to_string();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        queue = %config.queue_name,
        concurrency = config.worker_concurrency,
        debug_payloads = config.debug_payloads,
        log_filter = %log_level,
        "config_loaded"
    );

    // Start the consumer
    consumer::run(config).await?;

    Ok(())
}
