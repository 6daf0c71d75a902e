//! Webhook endpoint handlers.
//!
//! These handlers are designed to be extremely fast - they only:
//! 1. Pull the token, origin and body out of the HTTP request
//! 2. Hand them to the receiver
//! 3. Map the outcome onto a status code
//!
//! All processing of the payload happens in the background worker.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::receiver::{
    IncomingRequest, ReceiverResult, RejectReason, WebhookReceiver, EMPTY_PAYLOAD_MESSAGE,
    SUCCESS_MESSAGE,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub receiver: Arc<WebhookReceiver>,
    /// Lower-cased name of the header carrying the token
    pub token_header: Arc<str>,
    pub legacy_path_token: bool,
}

impl AppState {
    pub fn new(receiver: WebhookReceiver, token_header: &str, legacy_path_token: bool) -> Self {
        Self {
            receiver: Arc::new(receiver),
            token_header: Arc::from(token_header),
            legacy_path_token,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Capture
// =============================================================================

/// Capture endpoint with the token supplied in a header.
pub async fn capture(State(state): State<AppState>, request: Request) -> Response {
    let token = header_token(request.headers(), &state.token_header);
    handle(&state, token, request).await
}

/// Capture endpoint with the token as the last path segment.
///
/// Path segments end up in access logs and referrers, so this form is only
/// routed when explicitly enabled.
pub async fn capture_with_path_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    request: Request,
) -> Response {
    handle(&state, Some(token), request).await
}

async fn handle(state: &AppState, token: Option<String>, request: Request) -> Response {
    let origin = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let content_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let incoming = IncomingRequest::new(request.into_body(), token, origin)
        .with_content_length(content_length);

    state.receiver.handle(incoming).await.into_response()
}

fn header_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl IntoResponse for ReceiverResult {
    fn into_response(self) -> Response {
        match self {
            ReceiverResult::Accepted(_) => (StatusCode::OK, SUCCESS_MESSAGE).into_response(),
            // A non-2xx here would make the provider retry a payload that will never change.
            ReceiverResult::Rejected(RejectReason::EmptyPayload) => {
                (StatusCode::OK, EMPTY_PAYLOAD_MESSAGE).into_response()
            }
            ReceiverResult::Rejected(RejectReason::TooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large.").into_response()
            }
            ReceiverResult::Rejected(RejectReason::QueueUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable.").into_response()
            }
            ReceiverResult::Rejected(RejectReason::RateLimited) => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests.").into_response()
            }
            ReceiverResult::Rejected(RejectReason::Unreadable(_)) => {
                (StatusCode::BAD_REQUEST, "Unreadable request body.").into_response()
            }
            ReceiverResult::AuthFailed(_) => (StatusCode::FORBIDDEN, "Forbidden.").into_response(),
        }
    }
}
