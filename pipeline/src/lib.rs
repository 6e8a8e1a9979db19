//! relayq - minimal Redis-backed message pipeline.
//!
//! This library provides shared modules for the two relayq binaries:
//! - `relayq-api`: HTTP ingestion service pushing submissions onto the queue
//! - `relayq-worker`: consumer loop popping messages and recording results
//!
//! ## Architecture
//!
//! ```text
//! Producer → relayq-api → Redis list → relayq-worker (×N) → processed.log
//! ```
//!
//! Delivery is at most once per queue entry: a popped message that is not
//! recorded (crash, failed append) is lost, and nothing redelivers it.

pub mod config;
pub mod ingest;
pub mod queue;
pub mod shutdown;
pub mod sink;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use ingest::{Accepted, IngestError, Ingestor};
pub use queue::{MemoryQueue, PopOutcome, QueueError, QueueStore, RedisQueue};
pub use sink::{FileSink, ProcessedRecord, ResultSink, SinkError};
pub use web::AppState;
pub use worker::{Worker, WorkerReport, WorkerSettings};
