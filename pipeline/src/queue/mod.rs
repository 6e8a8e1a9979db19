//! Queue Store adapter boundary.
//!
//! This module provides:
//! - The `QueueStore` contract the ingestion service and workers depend on
//! - `RedisQueue`, the production adapter (`LPUSH` / `BRPOP`)
//! - `MemoryQueue`, an in-process implementation for tests and local runs
//!
//! ## Contract
//!
//! ```text
//! push(queue, payload)            durable append, no identifier assigned
//! blocking_pop(queue, max_wait)   Message(payload) | TimedOut, destructive
//! ping()                          liveness check
//! ```
//!
//! A successful pop removes the message for good. Nothing in this crate can
//! put it back.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryQueue;
pub use self::redis::{redis_url, RedisQueue};

/// Outcome of a bounded blocking pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopOutcome {
    /// A message was removed from the queue and handed to this caller only.
    Message(String),
    /// `max_wait` elapsed with nothing to pop. Not an error.
    TimedOut,
}

/// Failures talking to the Queue Store.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue store unavailable: {0}")]
    Unavailable(String),

    /// No answer within the caller's deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

/// Durable blocking list shared by producers and competing consumers.
///
/// Implementations must be safe to share behind an `Arc` across tasks.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append `payload` to `queue`.
    async fn push(&self, queue: &str, payload: &str) -> Result<(), QueueError>;

    /// Remove the oldest message of `queue`, waiting at most `max_wait`.
    async fn blocking_pop(&self, queue: &str, max_wait: Duration)
        -> Result<PopOutcome, QueueError>;

    /// No-op round trip used by health checks.
    async fn ping(&self) -> Result<(), QueueError>;
}
