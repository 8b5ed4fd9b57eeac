//! RelayWorks dispatch worker.
//!
//! A long-running consumer that pulls work items from the work queue, invokes
//! the agent capability, and posts the result back to the originating issue
//! with a token for the item's installation. One item is processed to
//! completion before the next is dequeued; horizontal scaling is more worker
//! processes on the same queue.
//!
//! Failure containment is the core contract here: any error inside one item's
//! processing is converted into a best-effort error comment on the issue, and
//! a failure of that comment itself is logged and swallowed. Nothing that
//! happens to one work item ever kills the subscribe loop — the requester
//! gets the outcome or an explanation, never silence, and the next item is
//! processed normally.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** The worker sequences calls between the queue, agent,
//! and GitHub ports. It contains no transport details of its own.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    AgentCapability, AgentError, CommentSink, DispatchRunId, GitHubError, HandlerError,
    MessageQueue, QueueError, SessionKey, WorkItem, WorkItemHandler,
};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

pub mod prompt;

pub use prompt::build_prompt;

/// Banner prefixed to every successful agent response comment.
pub const RESPONSE_BANNER: &str = "🤖 **RelayWorks Response**";

/// Failure of one work item's processing, reported back to the requester.
#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// The queue consumer: agent in the middle, GitHub on the way out.
pub struct DispatchWorker {
    queue: Arc<dyn MessageQueue>,
    agent: Arc<dyn AgentCapability>,
    comments: Arc<dyn CommentSink>,
}

impl DispatchWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        agent: Arc<dyn AgentCapability>,
        comments: Arc<dyn CommentSink>,
    ) -> Self {
        Self {
            queue,
            agent,
            comments,
        }
    }

    /// Subscribes to the work queue and processes items until the queue is
    /// closed.
    pub async fn run(self: Arc<Self>) -> Result<(), QueueError> {
        info!("dispatch worker starting");
        let queue = Arc::clone(&self.queue);
        queue.subscribe(self).await
    }

    async fn process(&self, item: &WorkItem) -> Result<(), DispatchError> {
        let prompt = prompt::build_prompt(item);
        // Session creation is idempotent per repository + issue, so repeated
        // invocations for the same issue share context.
        let session = SessionKey::for_issue(&item.repository, item.issue_number);

        let response = self.agent.run(&session, &prompt).await?;
        info!(chars = response.text.len(), "agent produced final response");

        let body = format!("{RESPONSE_BANNER}\n\n{}", response.text);
        self.comments
            .post_comment(item.installation_id, &item.repository, item.issue_number, &body)
            .await?;
        Ok(())
    }

    /// Best-effort error reporting; a broken reporting path must never crash
    /// the loop, so a secondary failure is only logged.
    async fn report_failure(&self, item: &WorkItem, failure: &DispatchError) {
        let body = format!("❌ Error processing request: {failure}");
        if let Err(secondary) = self
            .comments
            .post_comment(item.installation_id, &item.repository, item.issue_number, &body)
            .await
        {
            error!(error = %secondary, "failed to deliver error comment");
        }
    }
}

#[async_trait]
impl WorkItemHandler for DispatchWorker {
    async fn handle(&self, item: WorkItem) -> Result<(), HandlerError> {
        let run_id = DispatchRunId::new_random();
        let span = info_span!(
            "dispatch",
            %run_id,
            repository = %item.repository,
            issue = %item.issue_number,
            user = %item.user,
        );
        async {
            info!(command = %item.command, "processing work item");
            match self.process(&item).await {
                Ok(()) => info!("work item processed"),
                Err(failure) => {
                    warn!(error = %failure, "work item failed; reporting to requester");
                    self.report_failure(&item, &failure).await;
                }
            }
        }
        .instrument(span)
        .await;
        // The requester has been answered one way or the other; never bounce
        // the message back as a handler failure, which would requeue a
        // permanently broken item forever on redelivering backends.
        Ok(())
    }
}
