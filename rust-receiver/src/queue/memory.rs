//! In-process ingestion queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{IngestionQueue, ItemId, QueueError, QueueItem};

/// FIFO queue held in memory.
///
/// Clones share the same storage. [`MemoryQueue::set_available`] simulates a
/// backend outage.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<MemoryQueueInner>,
}

#[derive(Debug, Default)]
struct MemoryQueueInner {
    items: Mutex<Vec<(ItemId, QueueItem)>>,
    unavailable: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything queued so far, oldest first.
    pub fn items(&self) -> Vec<(ItemId, QueueItem)> {
        self.inner.items.lock().clone()
    }
}

#[async_trait]
impl IngestionQueue for MemoryQueue {
    async fn create_item(&self, item: QueueItem) -> Result<ItemId, QueueError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("memory queue offline".to_string()));
        }

        let id = ItemId::generate();
        self.inner.items.lock().push((id.clone(), item));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_items_kept_in_order() {
        let queue = MemoryQueue::new();
        let first = queue
            .create_item(QueueItem::new(Bytes::from_static(b"one")))
            .await
            .unwrap();
        let second = queue
            .create_item(QueueItem::new(Bytes::from_static(b"two")))
            .await
            .unwrap();

        let items = queue.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, first);
        assert_eq!(items[0].1.payload, Bytes::from_static(b"one"));
        assert_eq!(items[1].0, second);
    }

    #[tokio::test]
    async fn test_unavailable_rejects_and_stores_nothing() {
        let queue = MemoryQueue::new();
        queue.set_available(false);

        let result = queue
            .create_item(QueueItem::new(Bytes::from_static(b"lost")))
            .await;

        assert!(matches!(result, Err(QueueError::Unavailable(_))));
        assert!(queue.is_empty());

        queue.set_available(true);
        assert!(queue
            .create_item(QueueItem::new(Bytes::from_static(b"kept")))
            .await
            .is_ok());
        assert_eq!(queue.len(), 1);
    }
}
