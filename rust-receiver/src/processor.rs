//! Item processing for the worker.
//!
//! Payloads are opaque here as well: the worker records what arrived and how
//! long it waited in the queue, and refuses items that can never be
//! processed so they are not redelivered forever.

use axum::body::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use capture::queue::types::now_ms;
use capture::ItemId;

/// A queued item as delivered to the worker.
#[derive(Debug, Clone)]
pub struct DeliveredItem {
    pub item_id: ItemId,
    pub payload: Bytes,
    /// Enqueue time in milliseconds, when the message carried one.
    pub enqueued_at_ms: Option<u64>,
}

impl DeliveredItem {
    /// Build from raw delivery parts. The AMQP timestamp is in seconds.
    pub fn from_delivery(
        message_id: Option<String>,
        data: Vec<u8>,
        timestamp: Option<u64>,
    ) -> Self {
        Self {
            item_id: ItemId::from(message_id.unwrap_or_else(|| "unknown".to_string())),
            payload: Bytes::from(data),
            enqueued_at_ms: timestamp.map(|secs| secs.saturating_mul(1000)),
        }
    }
}

/// Result of processing one item.
#[derive(Debug)]
pub struct ProcessResult {
    pub item_id: ItemId,
    pub body_length: usize,
    /// Time spent waiting in the queue, when known.
    pub queue_latency_ms: Option<u64>,
}

/// Reasons an item cannot be processed. None of them improve on redelivery.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("item {0} has an empty payload")]
    EmptyPayload(ItemId),
}

/// Process one delivered item.
pub fn process_item(
    item: &DeliveredItem,
    debug_payloads: bool,
) -> Result<ProcessResult, ProcessError> {
    if item.payload.is_empty() {
        return Err(ProcessError::EmptyPayload(item.item_id.clone()));
    }

    let queue_latency_ms = item
        .enqueued_at_ms
        .map(|queued| now_ms().saturating_sub(queued));

    if debug_payloads {
        debug!(
            item_id = %item.item_id,
            payload = %String::from_utf8_lossy(&item.payload),
            "worker_payload_debug"
        );
    }

    info!(
        item_id = %item.item_id,
        body_length = item.payload.len(),
        queue_latency_ms = ?queue_latency_ms,
        "worker_item_processed"
    );

    Ok(ProcessResult {
        item_id: item.item_id.clone(),
        body_length: item.payload.len(),
        queue_latency_ms,
    })
}
