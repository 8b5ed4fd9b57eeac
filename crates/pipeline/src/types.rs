//! Shared value types for the RelayWorks dispatch domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. a [`WorkItem`] always has a
//! non-empty command) and participate in domain computations.

use serde::{Deserialize, Serialize};

use crate::{InstallationId, IssueNumber, RepositoryId};

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// The unit of queued work: one detected `/agent` command on one issue.
///
/// Constructed by the webhook receiver, serialised to the work queue as a flat
/// JSON object, deserialised once by the dispatch worker, and never persisted
/// beyond the queue. Absent optional fields survive a round-trip as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Repository the command was issued in, `"owner/name"` form.
    pub repository: RepositoryId,

    /// Issue the triggering comment belongs to.
    pub issue_number: IssueNumber,

    /// The raw slash-command line extracted from the comment. Never empty.
    pub command: String,

    /// Login of the triggering actor.
    #[serde(default = "default_user")]
    pub user: String,

    /// GitHub App installation the event arrived under, when present.
    ///
    /// `None` falls back to the process-wide default installation at the
    /// point where a token is needed.
    #[serde(default)]
    pub installation_id: Option<InstallationId>,
}

fn default_user() -> String {
    "unknown".to_string()
}

impl WorkItem {
    /// Creates a work item, returning `None` if `command` is empty.
    ///
    /// An absent `user` defaults to `"unknown"`.
    pub fn new(
        repository: RepositoryId,
        issue_number: IssueNumber,
        command: impl Into<String>,
        user: Option<String>,
        installation_id: Option<InstallationId>,
    ) -> Option<Self> {
        let command = command.into();
        if command.is_empty() {
            return None;
        }
        Some(Self {
            repository,
            issue_number,
            command,
            user: user.unwrap_or_else(default_user),
            installation_id,
        })
    }
}

// ---------------------------------------------------------------------------
// GitHub resources (as seen through the port traits)
// ---------------------------------------------------------------------------

/// A GitHub issue, reduced to the fields the agent needs to reason about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within the repository.
    pub number: IssueNumber,
    /// Issue title.
    pub title: String,
    /// Issue body; `None` when the author left it empty.
    pub body: Option<String>,
    /// `"open"` or `"closed"`.
    pub state: String,
    /// Login of the issue author.
    pub user: String,
    /// Label names attached to the issue.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Browser URL of the issue.
    pub html_url: String,
}

/// One entry returned by a directory listing of repository contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File or directory name.
    pub name: String,
    /// Path relative to the repository root.
    pub path: String,
    /// `"file"`, `"dir"`, `"symlink"`, or `"submodule"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Size in bytes; `None` for directories.
    #[serde(default)]
    pub size: Option<u64>,
    /// Git blob/tree SHA of the entry.
    pub sha: String,
}

/// A freshly created pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull-request number assigned by GitHub.
    pub number: u64,
    /// Browser URL of the pull request.
    pub html_url: String,
    /// Pull-request title.
    pub title: String,
    /// `"open"` at creation time.
    pub state: String,
}

// ---------------------------------------------------------------------------
// Agent capability
// ---------------------------------------------------------------------------

/// The final response produced by one agent invocation.
///
/// The capability may internally stream intermediate events and invoke any
/// subset of its declared tools; only the event marked final surfaces here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The final response text, ready to be posted as a comment body.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_rejects_empty_command() {
        let repo = RepositoryId::new("octocat/hello-world").unwrap();
        assert!(WorkItem::new(repo, IssueNumber::new(1), "", None, None).is_none());
    }

    #[test]
    fn work_item_defaults_user_to_unknown() {
        let repo = RepositoryId::new("octocat/hello-world").unwrap();
        let item = WorkItem::new(repo, IssueNumber::new(1), "/agent ping", None, None).unwrap();
        assert_eq!(item.user, "unknown");
    }

    #[test]
    fn work_item_round_trips_with_absent_optionals() {
        let repo = RepositoryId::new("octocat/hello-world").unwrap();
        let item = WorkItem::new(repo, IssueNumber::new(7), "/agent fix the bug", None, None)
            .unwrap();
        let encoded = serde_json::to_string(&item).unwrap();
        let decoded: WorkItem = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, item);
        assert!(decoded.installation_id.is_none());
    }

    #[test]
    fn work_item_deserialises_wire_format_without_user() {
        let decoded: WorkItem = serde_json::from_str(
            r#"{"repository":"octocat/hello-world","issue_number":3,"command":"/agent ping"}"#,
        )
        .unwrap();
        assert_eq!(decoded.user, "unknown");
        assert!(decoded.installation_id.is_none());
    }
}
