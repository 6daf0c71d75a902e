//! Webhook capture - fast, authenticated webhook ingestion.
//!
//! This library provides shared modules for the two binaries:
//! - `capture-web`: receives webhooks, checks the shared token and queues the raw payload
//! - `capture-worker`: drains the ingestion queue asynchronously
//!
//! ## Architecture
//!
//! ```text
//! Webhook sender → capture-web → ingestion queue (RabbitMQ) → capture-worker
//! ```

pub mod auth;
pub mod config;
pub mod logging;
pub mod queue;
pub mod ratelimit;
pub mod receiver;
pub mod web;

// Re-export commonly used types
pub use auth::{Authenticator, Secret, SecretStore};
pub use config::Config;
pub use queue::{IngestionQueue, ItemId, MemoryQueue, QueueError, QueueItem, RabbitQueue};
pub use receiver::{IncomingRequest, ReceiverResult, ReceiverSettings, WebhookReceiver};
pub use web::AppState;
