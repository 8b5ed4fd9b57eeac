//! Core dispatch domain for RelayWorks.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, cross-cutting error type, and port trait used throughout the relay.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`RepositoryId`, `IssueNumber`, etc.) |
//! | [`types`] | Shared value types (`WorkItem`, `Issue`, `AgentResponse`, etc.) |
//! | [`errors`] | Error taxonomy and retry-policy types |
//! | [`ports`] | Port traits implemented by infrastructure crates |
//! | [`config`] | Environment-driven runtime configuration |

pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{AgentConfig, AppConfig, GitHubConfig, ListenerConfig, QueueBackend, QueueConfig};
pub use errors::{
    AgentError, ConfigError, GitHubError, HandlerError, PermissionError, QueueError, RetryPolicy,
};
pub use identifiers::{
    BranchName, DispatchRunId, InstallationId, IssueNumber, RepositoryId, SessionKey,
};
pub use ports::{
    AgentCapability, CodeRepository, CommentSink, IssueTracker, MessageQueue, PullRequestManager,
    WorkItemHandler,
};
pub use types::{AgentResponse, FileEntry, Issue, PullRequest, WorkItem};
