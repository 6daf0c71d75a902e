//! Webhook capture web server.
//!
//! This binary provides a thin, fast web server that:
//! - Receives webhooks on `/webhook/capture`
//! - Checks the shared token
//! - Immediately enqueues the raw payload to RabbitMQ
//! - Returns 200 as soon as the broker has the message
//!
//! Sending SIGHUP re-reads the webhook secret without a restart.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use capture::logging::log_filter;
use capture::web::router;
use capture::{
    AppState, Authenticator, Config, RabbitQueue, ReceiverSettings, SecretStore, WebhookReceiver,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = log_filter(Config::debug_payloads_requested());
    let log_level = filter.to_string();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    let secret = config.load_secret().context("Failed to load webhook secret")?;
    if secret.is_empty() {
        warn!("webhook_secret_not_configured");
    }
    info!(
        port = config.port,
        queue = %config.queue_name,
        secret_configured = config.secret_configured(),
        token_header = %config.token_header,
        legacy_path_token = config.legacy_path_token,
        max_body_bytes = config.max_body_bytes,
        enqueue_timeout_ms = config.enqueue_timeout.as_millis() as u64,
        debug_payloads = config.debug_payloads,
        log_filter = %log_level,
        rate_limit_per_sec = config.rate_limit_per_sec,
        "config_loaded"
    );

    // Create RabbitMQ-backed ingestion queue
    let queue = RabbitQueue::new(config.amqp_url.clone(), config.queue_name.clone());
    info!("rabbitmq_queue_created");

    let receiver = WebhookReceiver::new(
        Authenticator::new(SecretStore::new(secret)),
        Arc::new(queue.clone()),
        ReceiverSettings::from(&config),
    );
    let state = AppState::new(receiver, &config.token_header, config.legacy_path_token);

    let secrets = state.receiver.authenticator().secrets().clone();
    tokio::spawn(reload_on_hangup(config.clone(), secrets));

    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // Close publisher connection
    queue.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Re-read the webhook secret every time SIGHUP arrives.
#[cfg(unix)]
async fn reload_on_hangup(config: Config, secrets: SecretStore) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "secret_reload_unavailable");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        match config.load_secret() {
            Ok(secret) => {
                let empty = secret.is_empty();
                secrets.reload(secret);
                info!(secret_empty = empty, "webhook_secret_reloaded");
            }
            // Keep serving with the previous secret.
            Err(e) => error!(error = %e, "webhook_secret_reload_failed"),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_config: Config, _secrets: SecretStore) {}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
