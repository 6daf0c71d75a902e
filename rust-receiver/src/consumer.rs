//! RabbitMQ consumer module using lapin.
//!
//! Connects to RabbitMQ, consumes the ingestion queue and spawns a task per
//! delivery. A delivery is acknowledged only after it was processed; items
//! that can never be processed are rejected without requeue.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tokio::signal;
use tracing::{error, info, warn};

use capture::queue::publisher::declare_queue;
use capture::Config;

use crate::processor::{process_item, DeliveredItem};

/// Run the RabbitMQ consumer.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Sets up QoS so at most `worker_concurrency` items are in flight
/// 3. Declares the ingestion queue (idempotent operation)
/// 4. Starts consuming messages, spawning a task for each
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    info!(url_length = config.amqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    let prefetch_count = u16::try_from(config.worker_concurrency).unwrap_or(u16::MAX);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    declare_queue(&channel, &config.queue_name).await?;

    info!(queue = %config.queue_name, "rabbitmq_queue_declared");

    let mut consumer = channel
        .basic_consume(
            &config.queue_name,
            "capture-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = %config.queue_name, "rabbitmq_consumer_started");
    info!("worker_ready");

    let channel = Arc::new(channel);

    let shutdown = async {
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
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("worker_stopping");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let channel = Arc::clone(&channel);
                        let debug_payloads = config.debug_payloads;
                        tokio::spawn(async move {
                            handle_delivery(&channel, delivery, debug_payloads).await;
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = conn.close(200, "Normal shutdown").await {
        warn!(error = %e, "rabbitmq_connection_close_error");
    }

    info!("worker_shutdown_complete");
    Ok(())
}

/// Process one delivery and settle it with the broker.
async fn handle_delivery(channel: &Channel, delivery: Delivery, debug_payloads: bool) {
    let delivery_tag = delivery.delivery_tag;
    let item = DeliveredItem::from_delivery(
        delivery
            .properties
            .message_id()
            .as_ref()
            .map(|s| s.to_string()),
        delivery.data,
        *delivery.properties.timestamp(),
    );

    info!(
        item_id = %item.item_id,
        delivery_tag = delivery_tag,
        redelivered = delivery.redelivered,
        "rabbitmq_item_received"
    );

    match process_item(&item, debug_payloads) {
        Ok(result) => {
            if let Err(e) = channel
                .basic_ack(delivery_tag, BasicAckOptions::default())
                .await
            {
                // The broker will redeliver; processing must tolerate that.
                error!(
                    item_id = %result.item_id,
                    delivery_tag = delivery_tag,
                    error = %e,
                    "rabbitmq_ack_failed"
                );
            } else {
                info!(
                    item_id = %result.item_id,
                    body_length = result.body_length,
                    queue_latency_ms = ?result.queue_latency_ms,
                    "rabbitmq_item_completed"
                );
            }
        }
        Err(e) => {
            error!(
                item_id = %item.item_id,
                error = %e,
                "worker_item_rejected"
            );

            if let Err(nack_err) = channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    },
                )
                .await
            {
                error!(
                    delivery_tag = delivery_tag,
                    error = %nack_err,
                    "rabbitmq_nack_failed"
                );
            }
        }
    }
}
