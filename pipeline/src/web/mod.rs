//! HTTP front of the ingestion service.
//!
//! This module provides a thin web server that:
//! - Accepts producer submissions on `POST /enqueue`
//! - Forwards them to the Queue Store through the `Ingestor`
//! - Reports Queue Store liveness on `GET /healthz`

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::ingest::MAX_BODY_BYTES;

pub use handlers::{enqueue, healthz, AppState, EnqueueResponse};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/enqueue", post(enqueue))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
