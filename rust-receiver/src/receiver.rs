//! Webhook receiver.
//!
//! Handles one request end to end:
//!
//! ```text
//! rate limit → authorize → read payload → enqueue → result
//! ```
//!
//! Every path ends in exactly one [`ReceiverResult`]. Every path except
//! success writes exactly one log entry at warn or error level. Nothing is
//! retried here; a sender that sees 503 is expected to resend.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthDecision, Authenticator, DenyReason};
use crate::config::Config;
use crate::queue::{IngestionQueue, ItemId, QueueError, QueueItem};
use crate::ratelimit::TokenBucket;
use crate::web::payload::{read_payload, PayloadRead};

/// Diagnostic body returned, with a 200, for an empty payload.
pub const EMPTY_PAYLOAD_MESSAGE: &str = "The payload was empty.";

/// Body returned when a payload was queued.
pub const SUCCESS_MESSAGE: &str = "Success!";

/// One inbound webhook call.
pub struct IncomingRequest {
    pub body: Body,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub token: Option<String>,
    pub origin: String,
    pub arrived_at: SystemTime,
}

impl IncomingRequest {
    pub fn new(body: Body, token: Option<String>, origin: impl Into<String>) -> Self {
        Self {
            body,
            content_length: None,
            token,
            origin: origin.into(),
            arrived_at: SystemTime::now(),
        }
    }

    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }
}

impl fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("content_length", &self.content_length)
            .field("token_present", &self.token.is_some())
            .field("origin", &self.origin)
            .field("arrived_at", &self.arrived_at)
            .finish_non_exhaustive()
    }
}

/// Why a request was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyPayload,
    TooLarge { limit: usize },
    QueueUnavailable(String),
    RateLimited,
    Unreadable(String),
}

/// Terminal outcome of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverResult {
    Accepted(ItemId),
    Rejected(RejectReason),
    AuthFailed(DenyReason),
}

/// Receiver behaviour switches, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    pub max_body_bytes: usize,
    pub enqueue_timeout: Duration,
    pub debug_payloads: bool,
    pub rate_limit_per_sec: u32,
    pub rate_limit_burst: u32,
}

impl From<&Config> for ReceiverSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            enqueue_timeout: config.enqueue_timeout,
            debug_payloads: config.debug_payloads,
            rate_limit_per_sec: config.rate_limit_per_sec,
            rate_limit_burst: config.rate_limit_burst,
        }
    }
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Authenticates inbound webhooks and hands their payloads to the queue.
pub struct WebhookReceiver {
    authenticator: Authenticator,
    queue: Arc<dyn IngestionQueue>,
    limiter: Option<TokenBucket>,
    settings: ReceiverSettings,
}

impl WebhookReceiver {
    pub fn new(
        authenticator: Authenticator,
        queue: Arc<dyn IngestionQueue>,
        settings: ReceiverSettings,
    ) -> Self {
        let limiter =
            TokenBucket::from_settings(settings.rate_limit_per_sec, settings.rate_limit_burst);
        Self {
            authenticator,
            queue,
            limiter,
            settings,
        }
    }

    /// The authenticator, whose secret store can be reloaded in place.
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Handle one request.
    pub async fn handle(&self, request: IncomingRequest) -> ReceiverResult {
        let IncomingRequest {
            body,
            content_length,
            token,
            origin,
            arrived_at,
        } = request;

        if let Some(limiter) = &self.limiter {
            if !limiter.try_acquire() {
                warn!(origin = %origin, "webhook_rate_limited");
                return ReceiverResult::Rejected(RejectReason::RateLimited);
            }
        }

        // The body is not touched until the token has been checked.
        if let AuthDecision::Forbidden(reason) = self.authenticator.authorize(token.as_deref()) {
            return ReceiverResult::AuthFailed(reason);
        }

        let payload = match read_payload(body, content_length, self.settings.max_body_bytes).await {
            Ok(PayloadRead::Ok(payload)) => payload,
            Ok(PayloadRead::Empty) => {
                error!(origin = %origin, "webhook_payload_empty");
                return ReceiverResult::Rejected(RejectReason::EmptyPayload);
            }
            Ok(PayloadRead::TooLarge { limit }) => {
                error!(
                    origin = %origin,
                    declared_length = ?content_length,
                    limit = limit,
                    "webhook_payload_too_large"
                );
                return ReceiverResult::Rejected(RejectReason::TooLarge { limit });
            }
            Err(e) => {
                warn!(origin = %origin, error = %e, "webhook_payload_unreadable");
                return ReceiverResult::Rejected(RejectReason::Unreadable(e.to_string()));
            }
        };

        if self.settings.debug_payloads {
            debug!(
                origin = %origin,
                payload = %String::from_utf8_lossy(&payload),
                "webhook_payload_debug"
            );
        }

        let body_length = payload.len();
        let timeout = self.settings.enqueue_timeout;
        let enqueued =
            tokio::time::timeout(timeout, self.queue.create_item(QueueItem::new(payload)))
                .await
                .unwrap_or_else(|_| Err(QueueError::Timeout(timeout)));

        match enqueued {
            Ok(item_id) => {
                info!(
                    origin = %origin,
                    item_id = %item_id,
                    body_length = body_length,
                    elapsed_ms = arrived_at.elapsed().unwrap_or_default().as_millis() as u64,
                    "webhook_enqueued"
                );
                ReceiverResult::Accepted(item_id)
            }
            Err(e) => {
                error!(
                    origin = %origin,
                    arrived_at_ms = arrived_at
                        .duration_since(SystemTime::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64,
                    body_length = body_length,
                    error = %e,
                    "webhook_enqueue_failed"
                );
                ReceiverResult::Rejected(RejectReason::QueueUnavailable(e.to_string()))
            }
        }
    }
}
