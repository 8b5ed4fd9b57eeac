//! In-process buffered publisher for the webhook path.
//!
//! The webhook handler must answer within the platform's response-time limit,
//! so it never awaits broker durability. Instead it enqueues into a bounded
//! channel here and a background task drains the channel into the real
//! broker. The trade-off is explicit: the HTTP response can return before the
//! publish is durable, and a broker failure after the response is logged, not
//! reported to the sender.

use std::sync::Arc;

use pipeline::{MessageQueue, QueueError, WorkItem};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Default bound of the in-process buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Non-blocking front end of a work queue.
///
/// Cheap to clone; all clones feed the same drain task.
#[derive(Clone)]
pub struct BufferedPublisher {
    tx: mpsc::Sender<WorkItem>,
}

impl BufferedPublisher {
    /// Spawns the drain task and returns the publisher handle.
    ///
    /// Dropping every publisher clone closes the channel and ends the task;
    /// await the handle to flush remaining items on shutdown.
    pub fn spawn(
        queue: Arc<dyn MessageQueue>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<WorkItem>(capacity);
        let drain = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                if let Err(e) = queue.publish(&item).await {
                    // The HTTP response is long gone; all we can do is log.
                    error!(
                        error = %e,
                        repository = %item.repository,
                        issue = %item.issue_number,
                        "dropping work item: broker publish failed"
                    );
                }
            }
        });
        (Self { tx }, drain)
    }

    /// Hands a work item to the drain task without blocking.
    ///
    /// A full or closed buffer is a [`QueueError::Publish`]; the webhook
    /// surfaces it as a 500 so the platform-level retry takes over.
    pub fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Publish {
                reason: "publish buffer full".to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => QueueError::Publish {
                reason: "publish buffer closed".to_string(),
            },
        })
    }
}
