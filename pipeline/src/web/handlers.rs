//! Endpoint handlers.
//!
//! Handlers only translate between HTTP and the `Ingestor`; validation,
//! deadlines and logging of store failures live there.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::ingest::{IngestError, Ingestor};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
}

impl AppState {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }
}

/// Successful enqueue response.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub enqueued: bool,
    pub queue: String,
    pub message: String,
}

/// Liveness endpoint backed by a Queue Store ping.
pub async fn healthz(State(state): State<AppState>) -> Response {
    match state.ingestor.health().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(IngestError::BackingStoreUnavailable(reason)) => {
            warn!(error = %reason, "health_check_failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("redis ping failed: {}", reason),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "health_check_failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Producer submission endpoint.
///
/// The body is plain text, or `{"message": "..."}` when sent with a JSON
/// content type.
pub async fn enqueue(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    match state.ingestor.submit(&body, content_type).await {
        Ok(accepted) => (
            StatusCode::OK,
            Json(EnqueueResponse {
                enqueued: true,
                queue: accepted.queue,
                message: accepted.message,
            }),
        )
            .into_response(),
        Err(IngestError::Validation) => {
            (StatusCode::BAD_REQUEST, "message is required").into_response()
        }
        Err(IngestError::BackingStoreUnavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "enqueue failed").into_response()
        }
    }
}
