//! RelayWorks work-queue infrastructure.
//!
//! Implements the [`pipeline::MessageQueue`] port with two backends:
//!
//! - [`RedisQueue`] — a server-side durable list for self-hosted deployments.
//!   Publish appends with `RPUSH`; subscribe blocks-and-pops with `BLPOP`
//!   using a short per-iteration timeout so the loop stays responsive to the
//!   stop signal.
//!
//! - [`PubSubQueue`] — Google Cloud Pub/Sub for cloud deployments. Publish
//!   waits for broker acknowledgment of durability; subscribe opens a
//!   streaming pull and acknowledges each message only after the handler
//!   succeeds, negatively-acknowledging on failure (at-least-once delivery
//!   with redelivery on consumer crash).
//!
//! The backend is selected once at process startup by [`for_config`] and
//! never mixed within one process. Both backends carry the same wire format:
//! a flat JSON object of [`pipeline::WorkItem`] fields, UTF-8 encoded.
//!
//! [`BufferedPublisher`] sits in front of a queue on the webhook path: a
//! bounded in-process channel that a background task drains into the real
//! broker, so the HTTP handler never awaits broker durability.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details, broker configuration, and message
//! serialisation all live here. The [`pipeline`] crate sees only
//! [`pipeline::MessageQueue`].

use std::sync::Arc;

use pipeline::{MessageQueue, QueueBackend, QueueConfig, QueueError};
use tracing::info;

mod buffer;
mod codec;
mod pubsub;
mod redis_list;

pub use buffer::{BufferedPublisher, DEFAULT_BUFFER_CAPACITY};
pub use pubsub::PubSubQueue;
pub use redis_list::RedisQueue;

/// Constructs the configured queue backend.
///
/// This is the single selection point: callers hold an
/// `Arc<dyn MessageQueue>` from here on and stay agnostic to the variant.
pub async fn for_config(config: &QueueConfig) -> Result<Arc<dyn MessageQueue>, QueueError> {
    match &config.backend {
        QueueBackend::Redis { url } => {
            info!(queue = %config.queue_name, "using redis work queue");
            Ok(Arc::new(RedisQueue::connect(url, &config.queue_name)?))
        }
        QueueBackend::PubSub { project_id } => {
            info!(
                topic = %config.queue_name,
                subscription = %config.subscription,
                "using google pub/sub work queue"
            );
            Ok(Arc::new(
                PubSubQueue::connect(project_id, &config.queue_name, &config.subscription).await?,
            ))
        }
    }
}
