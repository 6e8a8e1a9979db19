//! Worker consumer loop.
//!
//! One `Worker` is one strictly sequential state machine:
//!
//! ```text
//! Polling ─ timed out ──────────────────────────────▶ Polling
//!         ─ store error ─▶ backoff ─────────────────▶ Polling
//!         ─ message ─▶ Processing ─▶ Appending ─────▶ Polling
//!         ─ cancelled ─▶ Terminated
//! ```
//!
//! The pop is destructive. From the moment it returns a message until the
//! append succeeds, the message exists only in this task's memory: if the
//! process dies there, or the append fails, it is gone without a trace.
//! Running more workers means running more processes; the Queue Store hands
//! each message to exactly one of them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::queue::{PopOutcome, QueueError, QueueStore};
use crate::sink::{ProcessedRecord, ResultSink};

/// Grace on top of `pop_timeout` before a silent pop counts as a store error.
pub const POP_DEADLINE_MARGIN: Duration = Duration::from_secs(1);

/// Tuning for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub queue: String,
    /// Bounded wait of each pop; also bounds shutdown latency.
    pub pop_timeout: Duration,
    /// Pause after a failed pop.
    pub retry_backoff: Duration,
    /// Artificial processing time, widens the loss window.
    pub processing_delay: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue: config.queue_name.clone(),
            pop_timeout: config.pop_timeout,
            retry_backoff: config.retry_backoff,
            processing_delay: config.processing_delay,
        }
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Messages removed from the queue.
    pub popped: u64,
    /// Messages with a record in the sink.
    pub recorded: u64,
    /// Messages whose append failed.
    pub lost: u64,
}

pub struct Worker {
    store: Arc<dyn QueueStore>,
    sink: Arc<dyn ResultSink>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        store: Arc<dyn QueueStore>,
        sink: Arc<dyn ResultSink>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            sink,
            settings,
        }
    }

    /// Run until `shutdown` is observed at a polling boundary.
    ///
    /// A pop already in flight is allowed to finish, and so is the processing
    /// of whatever it returned. No new pop starts after cancellation.
    pub async fn run(&self, shutdown: CancellationToken) -> WorkerReport {
        let queue = self.settings.queue.as_str();
        let mut report = WorkerReport::default();

        info!(
            queue = %queue,
            pop_timeout_ms = self.settings.pop_timeout.as_millis() as u64,
            processing_delay_ms = self.settings.processing_delay.as_millis() as u64,
            "worker_ready"
        );

        loop {
            if shutdown.is_cancelled() {
                info!(queue = %queue, "worker_stopping");
                break;
            }

            // Not raced against shutdown: an abandoned BRPOP may still have
            // removed a message on the server.
            match self.pop(queue).await {
                Ok(PopOutcome::Message(payload)) => {
                    report.popped += 1;
                    info!(queue = %queue, message = %payload, "message_dequeued");

                    if self.handle(payload).await {
                        report.recorded += 1;
                    } else {
                        report.lost += 1;
                    }
                }
                Ok(PopOutcome::TimedOut) => {}
                Err(e) => {
                    error!(
                        queue = %queue,
                        error = %e,
                        backoff_ms = self.settings.retry_backoff.as_millis() as u64,
                        "dequeue_failed"
                    );

                    tokio::select! {
                        _ = sleep(self.settings.retry_backoff) => {}
                        _ = shutdown.cancelled() => {}
                    }
                }
            }
        }

        info!(
            queue = %queue,
            popped = report.popped,
            recorded = report.recorded,
            lost = report.lost,
            "worker_shutdown_complete"
        );

        report
    }

    /// Bounded pop. A store that stays silent past the deadline is treated
    /// like one that failed.
    async fn pop(&self, queue: &str) -> Result<PopOutcome, QueueError> {
        let deadline = self.settings.pop_timeout + POP_DEADLINE_MARGIN;

        match timeout(deadline, self.store.blocking_pop(queue, self.settings.pop_timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::Timeout(deadline)),
        }
    }

    /// Process and record one popped message; `false` means it was lost.
    async fn handle(&self, payload: String) -> bool {
        let record = self.process(payload).await;

        match self.sink.append(&record).await {
            Ok(()) => {
                info!(message = %record.payload, "message_processed");
                true
            }
            Err(e) => {
                // The source message is already gone from the queue
                error!(message = %record.payload, error = %e, "append_failed");
                false
            }
        }
    }

    async fn process(&self, payload: String) -> ProcessedRecord {
        if !self.settings.processing_delay.is_zero() {
            sleep(self.settings.processing_delay).await;
        }

        ProcessedRecord::now(payload)
    }
}
