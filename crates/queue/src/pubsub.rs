//! Google Cloud Pub/Sub work queue (cloud deployments).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use google_cloud_googleapis::pubsub::v1::PubsubMessage;
use google_cloud_pubsub::client::{Client, ClientConfig};
use google_cloud_pubsub::publisher::Publisher;
use google_cloud_pubsub::subscription::Subscription;
use pipeline::{MessageQueue, QueueError, WorkItem, WorkItemHandler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec;

/// Back-off before reopening a streaming pull that failed mid-loop.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// A Pub/Sub topic + subscription carrying work items.
///
/// Publish returns only after the broker acknowledges durability. Subscribe
/// acks a message only after the handler succeeds and nacks on failure, so a
/// crashed consumer gets its in-flight message redelivered. Ordering across
/// the subscription is best-effort.
pub struct PubSubQueue {
    publisher: Publisher,
    subscription: Subscription,
    topic_name: String,
    subscription_name: String,
    cancel: CancellationToken,
}

impl PubSubQueue {
    /// Authenticates against GCP and binds the topic and subscription.
    pub async fn connect(
        project_id: &str,
        topic_name: &str,
        subscription_name: &str,
    ) -> Result<Self, QueueError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| QueueError::Connect {
                reason: format!("pub/sub auth failed: {e}"),
            })?;
        let config = ClientConfig {
            project_id: Some(project_id.to_string()),
            ..config
        };
        let client = Client::new(config).await.map_err(|e| QueueError::Connect {
            reason: format!("pub/sub client failed: {e}"),
        })?;
        let topic = client.topic(topic_name);
        Ok(Self {
            publisher: topic.new_publisher(None),
            subscription: client.subscription(subscription_name),
            topic_name: topic_name.to_string(),
            subscription_name: subscription_name.to_string(),
            cancel: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl MessageQueue for PubSubQueue {
    async fn publish(&self, item: &WorkItem) -> Result<(), QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let message = PubsubMessage {
            data: codec::encode(item)?,
            ..Default::default()
        };
        let mut awaiter = self.publisher.publish(message).await;
        awaiter.get().await.map_err(|e| QueueError::Publish {
            reason: e.to_string(),
        })?;
        debug!(topic = %self.topic_name, "published work item to pub/sub topic");
        Ok(())
    }

    async fn subscribe(&self, handler: Arc<dyn WorkItemHandler>) -> Result<(), QueueError> {
        info!(subscription = %self.subscription_name, "subscribed to pub/sub subscription");
        loop {
            if self.cancel.is_cancelled() {
                info!(subscription = %self.subscription_name, "pub/sub subscribe loop stopped");
                return Ok(());
            }
            let handler = Arc::clone(&handler);
            let pull = self
                .subscription
                .receive(
                    move |message, _cancel| {
                        let handler = Arc::clone(&handler);
                        async move {
                            match codec::decode(&message.message.data) {
                                Ok(item) => {
                                    debug!(
                                        repository = %item.repository,
                                        issue = %item.issue_number,
                                        "received work item from pub/sub"
                                    );
                                    match handler.handle(item).await {
                                        Ok(()) => {
                                            let _ = message.ack().await;
                                        }
                                        Err(e) => {
                                            warn!(error = %e, "work item handler failed; requeueing");
                                            let _ = message.nack().await;
                                        }
                                    }
                                }
                                Err(e) => {
                                    error!(error = %e, "malformed pub/sub message; requeueing");
                                    let _ = message.nack().await;
                                }
                            }
                        }
                    },
                    self.cancel.child_token(),
                    None,
                )
                .await;
            match pull {
                Ok(()) => {} // streaming pull ended; loop re-checks the stop signal
                Err(e) => {
                    warn!(error = %e, "pub/sub streaming pull failed; backing off");
                    tokio::time::sleep(RECEIVE_BACKOFF).await;
                }
            }
        }
    }

    async fn close(&self) -> Result<(), QueueError> {
        // Cancelling the token ends the streaming pull; broker resources are
        // released when the client drops.
        self.cancel.cancel();
        Ok(())
    }
}
