//! Web server module for capturing inbound webhooks.
//!
//! A thin HTTP surface over [`WebhookReceiver`](crate::receiver::WebhookReceiver):
//! - `POST /webhook/capture` with the token in a header
//! - `POST /webhook/capture/:token` when the legacy path-token form is enabled
//! - `GET /health`
//!
//! Handlers only translate HTTP into an
//! [`IncomingRequest`](crate::receiver::IncomingRequest) and the outcome back
//! into a status code.

pub mod handlers;
pub mod payload;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

pub use handlers::{capture, capture_with_path_token, health, AppState, HealthResponse};
pub use payload::{read_payload, PayloadError, PayloadRead};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/webhook/capture", post(capture));

    if state.legacy_path_token {
        app = app.route("/webhook/capture/:token", post(capture_with_path_token));
    }

    // The receiver already logs every failed request once; 5xx responses from
    // the trace layer stay at debug so they do not double up.
    let trace = TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG));

    app.layer(trace).with_state(state)
}
