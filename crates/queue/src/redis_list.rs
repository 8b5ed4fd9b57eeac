//! Redis-list work queue (self-hosted deployments).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{MessageQueue, QueueError, RetryPolicy, WorkItem, WorkItemHandler};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec;

/// `BLPOP` timeout per poll iteration, so the loop re-checks the stop signal
/// at least once a second.
const POLL_TIMEOUT_SECS: f64 = 1.0;

/// Fallback back-off when a receive error carries no delay of its own.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// A durable Redis list carrying work items.
///
/// Delivery is strict FIFO. A message removed by `BLPOP` and abandoned on
/// shutdown is lost; the Pub/Sub backend is the one with redelivery.
pub struct RedisQueue {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    queue_name: String,
    cancel: CancellationToken,
}

impl RedisQueue {
    /// Validates `url` and prepares a lazily connected queue.
    ///
    /// The first publish or subscribe establishes the connection; the
    /// connection manager reconnects on its own after transient drops.
    pub fn connect(url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(|e| QueueError::Connect {
            reason: format!("invalid redis url: {e}"),
        })?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
            queue_name: queue_name.to_string(),
            cancel: CancellationToken::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, redis::RedisError> {
        let manager = self
            .manager
            .get_or_try_init(|| self.client.get_connection_manager())
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn publish(&self, item: &WorkItem) -> Result<(), QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let payload = codec::encode(item)?;
        let mut conn = self.connection().await.map_err(|e| QueueError::Publish {
            reason: format!("redis unreachable: {e}"),
        })?;
        let _: () = conn
            .rpush(&self.queue_name, payload)
            .await
            .map_err(|e| QueueError::Publish {
                reason: e.to_string(),
            })?;
        debug!(queue = %self.queue_name, "published work item to redis queue");
        Ok(())
    }

    async fn subscribe(&self, handler: Arc<dyn WorkItemHandler>) -> Result<(), QueueError> {
        info!(queue = %self.queue_name, "subscribed to redis queue");
        while !self.cancel.is_cancelled() {
            let mut conn = match self.connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "redis unreachable; retrying");
                    tokio::time::sleep(RECEIVE_BACKOFF).await;
                    continue;
                }
            };
            let reply: Result<Option<(String, Vec<u8>)>, redis::RedisError> =
                conn.blpop(&self.queue_name, POLL_TIMEOUT_SECS).await;
            match reply {
                Ok(Some((_, payload))) => match codec::decode(&payload) {
                    Ok(item) => {
                        debug!(
                            repository = %item.repository,
                            issue = %item.issue_number,
                            "received work item from redis queue"
                        );
                        if let Err(e) = handler.handle(item).await {
                            warn!(error = %e, "work item handler failed");
                        }
                    }
                    // The list entry is already popped; all we can do is log.
                    Err(e) => error!(error = %e, "dropping malformed queue message"),
                },
                Ok(None) => {} // poll timeout; loop to re-check the stop signal
                Err(e) => {
                    let receive = QueueError::Receive {
                        reason: e.to_string(),
                    };
                    warn!(error = %receive, "redis receive failed; backing off");
                    if let RetryPolicy::Retryable { after } = receive.retry_policy() {
                        tokio::time::sleep(after.unwrap_or(RECEIVE_BACKOFF)).await;
                    }
                }
            }
        }
        info!(queue = %self.queue_name, "redis subscribe loop stopped");
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.cancel.cancel();
        Ok(())
    }
}
