//! In-process Queue Store.
//!
//! Same contract as the Redis adapter minus durability: the backlog lives in
//! this process and is gone when it exits. Outages can be simulated with
//! [`MemoryQueue::set_available`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout_at, Instant};

use super::{PopOutcome, QueueError, QueueStore};

#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<MemoryQueueInner>,
}

struct MemoryQueueInner {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
    available: AtomicBool,
}

impl Default for MemoryQueueInner {
    fn default() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            pushed: Notify::new(),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting in `queue`.
    pub async fn len(&self, queue: &str) -> usize {
        self.inner
            .lists
            .lock()
            .await
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Toggle a simulated outage; while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::Unavailable("memory queue offline".to_string()))
        }
    }

    async fn try_pop(&self, queue: &str) -> Option<String> {
        self.inner
            .lists
            .lock()
            .await
            .get_mut(queue)
            .and_then(VecDeque::pop_back)
    }
}

#[async_trait]
impl QueueStore for MemoryQueue {
    async fn push(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        self.check_available()?;

        self.inner
            .lists
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_front(payload.to_string());

        self.inner.pushed.notify_waiters();
        Ok(())
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        max_wait: Duration,
    ) -> Result<PopOutcome, QueueError> {
        self.check_available()?;
        let deadline = Instant::now() + max_wait;

        loop {
            // Register before checking so a push in between is not missed
            let notified = self.inner.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.try_pop(queue).await {
                return Ok(PopOutcome::Message(payload));
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Ok(PopOutcome::TimedOut);
            }
        }
    }

    async fn ping(&self) -> Result<(), QueueError> {
        self.check_available()
    }
}
