//! Ingestion queue.
//!
//! The receiver depends only on [`IngestionQueue`]; it appends items and
//! never reads them back. Two implementations are provided:
//! - [`RabbitQueue`]: durable RabbitMQ queue used in production
//! - [`MemoryQueue`]: in-process queue for tests and local runs
//!
//! ## Architecture
//!
//! ```text
//! Webhook sender → capture-web → ingestion queue → capture-worker
//! ```

pub mod memory;
pub mod publisher;
pub mod types;

pub use memory::MemoryQueue;
pub use publisher::RabbitQueue;
pub use types::{IngestionQueue, ItemId, QueueError, QueueItem};
