//! Ingestion service: validate a producer submission and forward it to the
//! Queue Store.
//!
//! The service keeps no state beyond the shared store handle. Accepting a
//! submission means only that the store took it; producers get no later
//! signal about what happens to the message.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info};

use crate::queue::{QueueError, QueueStore};

/// Largest request body accepted by the HTTP layer.
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// Deadline for forwarding one submission to the Queue Store.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for the liveness ping.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Rejection reasons for a submission.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Nothing left after normalisation. Caused by the client.
    #[error("message is required")]
    Validation,

    /// The store failed or missed its deadline. The caller should retry.
    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),
}

/// A submission the Queue Store has taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub queue: String,
    pub message: String,
}

/// Field carrying the message in a structured body.
const MESSAGE_FIELD: &str = "message";

/// Turn a raw body into the message to enqueue.
///
/// JSON bodies contribute their `message` field, matched exactly first and
/// then ignoring ASCII case. A JSON `null`, or an object without the field or
/// with a `null` value, yields an empty message. Anything else that claims
/// JSON (arrays, scalars, a non-string field, invalid syntax) is used
/// verbatim, like a plain-text body.
pub fn normalize(body: &[u8], content_type: Option<&str>) -> String {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);

    if is_json {
        if let Some(message) = structured_message(body) {
            return message;
        }
    }

    String::from_utf8_lossy(body).trim().to_string()
}

/// `None` when the body does not decode as a message object.
fn structured_message(body: &[u8]) -> Option<String> {
    let object = match serde_json::from_slice::<Value>(body).ok()? {
        Value::Null => return Some(String::new()),
        Value::Object(object) => object,
        _ => return None,
    };

    let field = object.get(MESSAGE_FIELD).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(MESSAGE_FIELD))
            .map(|(_, value)| value)
    });

    match field {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(message)) => Some(message.trim().to_string()),
        Some(_) => None,
    }
}

/// Producer-facing entry point, cheap to clone into each request.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn QueueStore>,
    queue: String,
    enqueue_timeout: Duration,
    health_timeout: Duration,
}

impl Ingestor {
    pub fn new(store: Arc<dyn QueueStore>, queue: impl Into<String>) -> Self {
        Self::with_timeouts(store, queue, ENQUEUE_TIMEOUT, HEALTH_TIMEOUT)
    }

    pub fn with_timeouts(
        store: Arc<dyn QueueStore>,
        queue: impl Into<String>,
        enqueue_timeout: Duration,
        health_timeout: Duration,
    ) -> Self {
        Self {
            store,
            queue: queue.into(),
            enqueue_timeout,
            health_timeout,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Validate and enqueue one submission.
    ///
    /// Identical payloads are not deduplicated; each call that succeeds adds
    /// one queue entry.
    pub async fn submit(
        &self,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<Accepted, IngestError> {
        let message = normalize(body, content_type);
        if message.is_empty() {
            return Err(IngestError::Validation);
        }

        match timeout(self.enqueue_timeout, self.store.push(&self.queue, &message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(queue = %self.queue, error = %e, "enqueue_failed");
                return Err(IngestError::BackingStoreUnavailable(e.to_string()));
            }
            Err(_) => {
                error!(
                    queue = %self.queue,
                    timeout_ms = self.enqueue_timeout.as_millis() as u64,
                    "enqueue_timeout"
                );
                return Err(IngestError::BackingStoreUnavailable(
                    QueueError::Timeout(self.enqueue_timeout).to_string(),
                ));
            }
        }

        info!(queue = %self.queue, message = %message, "message_enqueued");

        Ok(Accepted {
            queue: self.queue.clone(),
            message,
        })
    }

    /// Ping the Queue Store within the health deadline.
    pub async fn health(&self) -> Result<(), IngestError> {
        match timeout(self.health_timeout, self.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(IngestError::BackingStoreUnavailable(e.to_string())),
            Err(_) => Err(IngestError::BackingStoreUnavailable(
                QueueError::Timeout(self.health_timeout).to_string(),
            )),
        }
    }
}
