//! Port traits implemented by infrastructure crates.
//!
//! The dispatch domain sees only these traits. The `queue` crate supplies
//! [`MessageQueue`] over Redis or Google Pub/Sub, the `github` crate supplies
//! the GitHub-facing ports over the REST API, and the `agent` crate supplies
//! [`AgentCapability`] over an LLM provider. Tests supply in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{AgentError, GitHubError, HandlerError, QueueError};
use crate::identifiers::{BranchName, InstallationId, IssueNumber, RepositoryId, SessionKey};
use crate::types::{AgentResponse, FileEntry, Issue, PullRequest, WorkItem};

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------

/// Consumes work items delivered by a [`MessageQueue`] subscription.
///
/// A handler failure is reported to the backend, which may redeliver; it must
/// never terminate the subscribe loop.
#[async_trait]
pub trait WorkItemHandler: Send + Sync {
    /// Processes one delivered work item.
    async fn handle(&self, item: WorkItem) -> Result<(), HandlerError>;
}

/// A durable channel of [`WorkItem`] messages.
///
/// The contract is identical regardless of backend; callers select a backend
/// once at process startup and never mix them within one process.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Serialises the work item as JSON and durably enqueues it.
    ///
    /// Fails fast with [`QueueError::Publish`] when the backend is
    /// unreachable rather than blocking indefinitely or silently dropping.
    async fn publish(&self, item: &WorkItem) -> Result<(), QueueError>;

    /// Enters a blocking receive loop, invoking `handler` once per received
    /// message until [`MessageQueue::close`] is called.
    ///
    /// Backend-level errors mid-loop are logged and retried after a short
    /// delay; a single malformed or failing message must not kill the loop.
    async fn subscribe(&self, handler: Arc<dyn WorkItemHandler>) -> Result<(), QueueError>;

    /// Stops the subscribe loop and releases backend resources. Idempotent.
    async fn close(&self) -> Result<(), QueueError>;
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// Read and comment on issues.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetches one issue.
    async fn issue(&self, repository: &RepositoryId, number: IssueNumber)
        -> Result<Issue, GitHubError>;

    /// Creates a comment on an issue.
    async fn create_comment(
        &self,
        repository: &RepositoryId,
        number: IssueNumber,
        body: &str,
    ) -> Result<(), GitHubError>;
}

/// Read and write repository contents and refs.
#[async_trait]
pub trait CodeRepository: Send + Sync {
    /// Reads a file's decoded UTF-8 content at `reference`.
    async fn read_file(
        &self,
        repository: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<String, GitHubError>;

    /// Lists the entries of a directory (empty path for the root) at
    /// `reference`.
    async fn list_files(
        &self,
        repository: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<Vec<FileEntry>, GitHubError>;

    /// Creates `branch` pointing at the head of `from_reference`.
    async fn create_branch(
        &self,
        repository: &RepositoryId,
        branch: &BranchName,
        from_reference: &str,
    ) -> Result<(), GitHubError>;

    /// Creates or updates a file on `branch` with a commit carrying `message`.
    async fn update_file(
        &self,
        repository: &RepositoryId,
        path: &str,
        content: &str,
        message: &str,
        branch: &BranchName,
    ) -> Result<(), GitHubError>;
}

/// Open pull requests.
#[async_trait]
pub trait PullRequestManager: Send + Sync {
    /// Opens a pull request from `head` into `base`.
    async fn create_pull_request(
        &self,
        repository: &RepositoryId,
        title: &str,
        body: &str,
        head: &BranchName,
        base: &str,
    ) -> Result<PullRequest, GitHubError>;
}

/// Posts issue comments on behalf of a specific installation.
///
/// This is the worker's outbound port: the implementation resolves the
/// installation (or the process-wide default when `None`), obtains a token
/// from the credential manager, and posts.
#[async_trait]
pub trait CommentSink: Send + Sync {
    /// Posts `body` as a comment on the issue.
    async fn post_comment(
        &self,
        installation: Option<InstallationId>,
        repository: &RepositoryId,
        issue: IssueNumber,
        body: &str,
    ) -> Result<(), GitHubError>;
}

// ---------------------------------------------------------------------------
// Agent capability
// ---------------------------------------------------------------------------

/// An opaque capability: given a prompt and a session, produce a final text
/// response after invoking zero or more of its declared tools.
///
/// Which tools were invoked — if any — is invisible to the caller.
/// Implementations drain their provider's internal event stream and return
/// only the response marked final.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    /// Runs one invocation within the session identified by `session`.
    ///
    /// Invocations sharing a session share conversational context; session
    /// creation is idempotent per key.
    async fn run(&self, session: &SessionKey, prompt: &str)
        -> Result<AgentResponse, AgentError>;
}
