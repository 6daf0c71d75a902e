//! Queue item types and the append-only queue contract.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Bytes;
use rand::RngCore;
use thiserror::Error;

/// An accepted webhook payload on its way to the queue.
///
/// The payload is kept exactly as received; nothing in this crate parses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub payload: Bytes,
    /// Milliseconds since the Unix epoch.
    pub enqueued_at_ms: u64,
}

impl QueueItem {
    /// Wrap a payload, stamping it with the current time.
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            enqueued_at_ms: now_ms(),
        }
    }
}

/// Identifier assigned to an item when it is queued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(String);

impl ItemId {
    /// Random 64-bit identifier, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("item-{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure to hand an item to the queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("enqueue timed out after {0:?}")]
    Timeout(Duration),
}

/// Append-only ingestion queue.
///
/// Implementations must be safe for concurrent appends and must not return
/// `Ok` until the item is durably accepted by the backend.
#[async_trait]
pub trait IngestionQueue: Send + Sync {
    async fn create_item(&self, item: QueueItem) -> Result<ItemId, QueueError>;
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_format() {
        let id = ItemId::generate();
        assert!(id.as_str().starts_with("item-"));
        assert_eq!(id.as_str().len(), "item-".len() + 16);
    }

    #[test]
    fn test_item_ids_are_distinct() {
        assert_ne!(ItemId::generate(), ItemId::generate());
    }

    #[test]
    fn test_queue_item_keeps_payload_verbatim() {
        let raw = Bytes::from_static(b"\x00\xff{\"event\":\"ping\"}\n");
        let item = QueueItem::new(raw.clone());
        assert_eq!(item.payload, raw);
        assert!(item.enqueued_at_ms > 0);
    }
}
