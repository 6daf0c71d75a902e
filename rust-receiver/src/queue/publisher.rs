//! RabbitMQ-backed ingestion queue.
//!
//! The connection is opened lazily on first use and re-established
//! whenever the channel is found closed, so a broker restart surfaces as a
//! handful of failed enqueues rather than a dead process.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{IngestionQueue, ItemId, QueueError, QueueItem};

/// Ingestion queue backed by a durable RabbitMQ queue.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct RabbitQueue {
    inner: Arc<RabbitQueueInner>,
}

struct RabbitQueueInner {
    url: String,
    queue: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl RabbitQueue {
    /// Create a queue handle. No connection is made until the first enqueue.
    pub fn new(url: String, queue: String) -> Self {
        Self {
            inner: Arc::new(RabbitQueueInner {
                url,
                queue,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.inner.queue
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!(queue = %self.inner.queue, "rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        // Publisher confirms: an enqueue only succeeds once the broker has the message.
        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        declare_queue(&ch, &self.inner.queue).await?;

        info!(queue = %self.inner.queue, "rabbitmq_publisher_connected");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    async fn publish(&self, item: &QueueItem, id: &ItemId) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let confirmation = channel
            .basic_publish(
                "",
                &self.inner.queue,
                BasicPublishOptions::default(),
                &item.payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/octet-stream".into())
                    .with_message_id(id.to_string().into())
                    .with_timestamp(item.enqueued_at_ms / 1000),
            )
            .await
            .context("Failed to publish to ingestion queue")?
            .await
            .context("Failed to confirm publish")?;

        if confirmation.is_nack() {
            anyhow::bail!("Broker rejected message");
        }

        debug!(
            queue = %self.inner.queue,
            item_id = %id,
            body_length = item.payload.len(),
            "rabbitmq_item_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

#[async_trait]
impl IngestionQueue for RabbitQueue {
    async fn create_item(&self, item: QueueItem) -> Result<ItemId, QueueError> {
        let id = ItemId::generate();
        self.publish(&item, &id)
            .await
            .map_err(|e| QueueError::Unavailable(format!("{e:#}")))?;
        Ok(id)
    }
}

/// Declare the durable ingestion queue. Idempotent.
pub async fn declare_queue(channel: &Channel, queue: &str) -> Result<()> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to declare queue {queue}"))?;

    Ok(())
}
