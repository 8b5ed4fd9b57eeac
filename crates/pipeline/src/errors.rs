//! Error taxonomy and retry-policy types for the RelayWorks dispatch domain.
//!
//! Port-level error types live here because the port traits in
//! [`crate::ports`] name them. Component-internal failures (e.g. a webhook
//! signature mismatch) are defined in the crate that produces them.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that
//! participates in the subscribe loop's retry decisions must be able to
//! produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the subscribe loop decide
/// whether to re-attempt an operation without escalating.
///
/// - `Retryable` errors: broker I/O hiccups, transient rate-limit responses.
/// - `NonRetryable` errors: malformed messages, revoked credentials, invalid
///   configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying. `None`
    /// means retry immediately or apply the caller's own back-off schedule.
    Retryable {
        /// Minimum back-off before the next attempt.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the caller escalates or drops.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------

/// Failures of the work-queue port, identical across backends.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backend could not be reached or configured at construction time.
    #[error("queue backend unavailable: {reason}")]
    Connect {
        /// Backend description of the failure.
        reason: String,
    },

    /// The message could not be durably enqueued.
    ///
    /// Surfaced to the webhook sender as a 500 so the platform-level webhook
    /// retry can take over; never silently dropped.
    #[error("queue publish failed: {reason}")]
    Publish {
        /// Backend description of the failure.
        reason: String,
    },

    /// Backend-level receive failure inside the subscribe loop.
    ///
    /// The loop logs this, backs off briefly, and retries; it never
    /// terminates on a receive error.
    #[error("queue receive failed: {reason}")]
    Receive {
        /// Backend description of the failure.
        reason: String,
    },

    /// A received message body could not be decoded as a work item.
    #[error("malformed queue message: {reason}")]
    Decode {
        /// Decoder description of the failure.
        reason: String,
    },

    /// The queue has been closed; no further publishes or receives.
    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    /// Retry classification for the subscribe loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            QueueError::Receive { .. } => RetryPolicy::Retryable {
                after: Some(Duration::from_secs(1)),
            },
            QueueError::Connect { .. }
            | QueueError::Publish { .. }
            | QueueError::Decode { .. }
            | QueueError::Closed => RetryPolicy::NonRetryable,
        }
    }
}

/// Failure of a work-item handler, reported back to the queue backend.
///
/// Backends with redelivery semantics negatively-acknowledge the message on
/// handler failure.
#[derive(Debug, Error)]
#[error("work item handling failed: {reason}")]
pub struct HandlerError {
    /// Handler description of the failure.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// GitHub (credentials + REST API)
// ---------------------------------------------------------------------------

/// Failures of the GitHub-facing ports.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The App credential exchange failed (network error, invalid key,
    /// revoked installation, missing installation id).
    ///
    /// Not retried internally: retrying with a stale or invalid key is
    /// pointless, so this propagates to the caller, which decides.
    #[error("GitHub App authentication failed: {reason}")]
    Authentication {
        /// Description of the exchange failure.
        reason: String,
    },

    /// A REST call failed; names the operation and the resource it targeted.
    #[error("GitHub {operation} on '{resource}' failed: {reason}")]
    Api {
        /// The logical operation (e.g. `"create_branch"`).
        operation: String,
        /// The path or resource the operation targeted.
        resource: String,
        /// HTTP status, when the request reached GitHub.
        status: Option<u16>,
        /// Response or transport description of the failure.
        reason: String,
    },
}

impl GitHubError {
    /// Retry classification. Authentication failures and 4xx responses are
    /// final; rate limits and server errors may be retried.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            GitHubError::Authentication { .. } => RetryPolicy::NonRetryable,
            GitHubError::Api { status, .. } => match status {
                Some(429) | Some(500..=599) => RetryPolicy::Retryable { after: None },
                Some(_) => RetryPolicy::NonRetryable,
                None => RetryPolicy::Retryable { after: None },
            },
        }
    }

    /// Convenience constructor for [`GitHubError::Api`].
    pub fn api(
        operation: impl Into<String>,
        resource: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        GitHubError::Api {
            operation: operation.into(),
            resource: resource.into(),
            status,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent capability
// ---------------------------------------------------------------------------

/// Failures of the agent-capability port.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The underlying model provider rejected or aborted the invocation.
    #[error("agent provider call failed: {reason}")]
    Provider {
        /// Provider description of the failure.
        reason: String,
    },

    /// The capability finished without producing a final response event.
    #[error("agent returned no final response")]
    NoFinalResponse,
}

/// An agent identity attempted a tool call its role does not permit.
///
/// Reported back to the capability as a rejected tool call, never a crash.
#[derive(Debug, Error)]
#[error("agent '{agent}' with role '{role}' does not have permission '{permission}'")]
pub struct PermissionError {
    /// The agent identity that made the call.
    pub agent: String,
    /// The role the identity resolved to.
    pub role: String,
    /// The permission the tool requires.
    pub permission: String,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The process configuration is invalid; the process never starts with one.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("missing required environment variable {name}")]
    MissingVar {
        /// The variable name.
        name: &'static str,
    },

    /// An environment variable is present but unusable.
    #[error("invalid value for {name}: {reason}")]
    InvalidVar {
        /// The variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_errors_are_retryable_with_backoff() {
        let error = QueueError::Receive {
            reason: "connection reset".into(),
        };
        assert_eq!(
            error.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(1))
            }
        );
    }

    #[test]
    fn decode_errors_are_not_retryable() {
        let error = QueueError::Decode {
            reason: "not json".into(),
        };
        assert_eq!(error.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn authentication_failures_are_final() {
        let error = GitHubError::Authentication {
            reason: "revoked installation".into(),
        };
        assert_eq!(error.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn server_errors_are_retryable() {
        let error = GitHubError::api("create_comment", "octocat/hello-world#1", Some(502), "bad gateway");
        assert_eq!(error.retry_policy(), RetryPolicy::Retryable { after: None });
    }

    #[test]
    fn api_errors_name_operation_and_resource() {
        let error = GitHubError::api("read_file", "src/main.rs", Some(404), "Not Found");
        assert_eq!(
            error.to_string(),
            "GitHub read_file on 'src/main.rs' failed: Not Found"
        );
    }
}
