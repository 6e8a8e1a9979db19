//! Redis Queue Store adapter.
//!
//! Producers `LPUSH`, consumers `BRPOP`, so a single producer feeding a single
//! consumer sees FIFO order. Redis arbitrates between competing consumers:
//! each popped element is returned to exactly one client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};

use super::{PopOutcome, QueueError, QueueStore};

/// Smallest `BRPOP` timeout sent to Redis; `0` would block forever.
const MIN_POP_WAIT_SECS: f64 = 0.01;

/// Upper bound on establishing the shared connection, retries included.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Reconnect attempts the manager makes before surfacing an error.
const CONNECT_RETRIES: usize = 1;

/// Build a connection URL from `host:port` or pass a full URL through.
pub fn redis_url(addr: &str) -> String {
    if addr.starts_with("redis://") || addr.starts_with("rediss://") {
        addr.to_string()
    } else {
        format!("redis://{}", addr)
    }
}

/// Redis-backed queue with lazy connection management.
///
/// Cloning is cheap and every clone shares one connection. The connection is
/// opened on first use, so the process can start while Redis is still down.
#[derive(Clone)]
pub struct RedisQueue {
    inner: Arc<RedisQueueInner>,
}

struct RedisQueueInner {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisQueue {
    /// Create a queue handle for `addr` without connecting.
    pub fn new(addr: &str) -> Result<Self, QueueError> {
        let client = Client::open(redis_url(addr))?;

        Ok(Self {
            inner: Arc::new(RedisQueueInner {
                client,
                connection: RwLock::new(None),
            }),
        })
    }

    /// Return the shared connection, opening it if needed.
    ///
    /// `ConnectionManager` reconnects on its own once established.
    async fn connection(&self) -> Result<ConnectionManager, QueueError> {
        {
            let connection = self.inner.connection.read().await;
            if let Some(conn) = connection.as_ref() {
                return Ok(conn.clone());
            }
        }

        let mut connection = self.inner.connection.write().await;

        // Double-check after acquiring write lock
        if let Some(conn) = connection.as_ref() {
            return Ok(conn.clone());
        }

        info!("redis_connecting");
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_number_of_retries(CONNECT_RETRIES);
        let connect = ConnectionManager::new_with_config(self.inner.client.clone(), config);

        let conn = match timeout(CONNECT_TIMEOUT, connect).await {
            Ok(conn) => conn?,
            Err(_) => {
                warn!(timeout_ms = CONNECT_TIMEOUT.as_millis() as u64, "redis_connect_timeout");
                return Err(QueueError::Timeout(CONNECT_TIMEOUT));
            }
        };
        info!("redis_connected");

        *connection = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl QueueStore for RedisQueue {
    async fn push(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.lpush(queue, payload).await?;
        Ok(())
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        max_wait: Duration,
    ) -> Result<PopOutcome, QueueError> {
        let mut conn = self.connection().await?;
        let wait = max_wait.as_secs_f64().max(MIN_POP_WAIT_SECS);

        // BRPOP replies [key, element], or nil once the wait elapses
        let reply: Option<(String, String)> = conn.brpop(queue, wait).await?;

        Ok(match reply {
            Some((_, payload)) => PopOutcome::Message(payload),
            None => PopOutcome::TimedOut,
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
