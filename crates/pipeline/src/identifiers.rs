//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging — for example —
//! an [`IssueNumber`] with an [`InstallationId`] even though both are `u64` under
//! the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — GitHub-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a GitHub Issue within a repository.
    ///
    /// Wraps the issue number assigned by GitHub (positive integer).
    IssueNumber
}

u64_id! {
    /// Identifies a GitHub App installation.
    ///
    /// Installation tokens are cached per [`InstallationId`]; a work item that
    /// carries no installation falls back to the process-wide default.
    InstallationId
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single dispatch of one work item through the worker.
///
/// Generated fresh for every dequeued work item; propagated through spans so
/// all activity from a single dispatch can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchRunId(Uuid);

impl DispatchRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`DispatchRunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DispatchRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed
// ---------------------------------------------------------------------------

/// Identifies a GitHub repository in `"owner/name"` format.
///
/// Unlike the plain string identifiers below, construction validates the
/// two-segment form so a bare repository name can never masquerade as a full
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Creates a repository identifier, returning `None` unless the value is
    /// of the form `"owner/name"` with both segments non-empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        match v.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Some(Self(v))
            }
            _ => None,
        }
    }

    /// Returns the full `"owner/name"` identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the owner segment.
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(owner, _)| owner).unwrap_or("")
    }

    /// Returns the repository-name segment.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, name)| name).unwrap_or("")
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

string_id! {
    /// A Git branch name (e.g. `"main"`, `"feature/add-login-button"`).
    BranchName
}

/// Keys an agent conversation session.
///
/// Sessions are scoped by repository and issue so repeated invocations for the
/// same issue share context. The key is derived, never parsed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Derives the session key for an issue: `"{owner}_{name}_{number}"`.
    pub fn for_issue(repository: &RepositoryId, issue: IssueNumber) -> Self {
        Self(format!("{}_{}", repository.as_str().replace('/', "_"), issue))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_id_requires_owner_and_name() {
        assert!(RepositoryId::new("octocat/hello-world").is_some());
        assert!(RepositoryId::new("hello-world").is_none());
        assert!(RepositoryId::new("/hello-world").is_none());
        assert!(RepositoryId::new("octocat/").is_none());
        assert!(RepositoryId::new("a/b/c").is_none());
        assert!(RepositoryId::new("").is_none());
    }

    #[test]
    fn repository_id_exposes_segments() {
        let repo = RepositoryId::new("octocat/hello-world").unwrap();
        assert_eq!(repo.owner(), "octocat");
        assert_eq!(repo.name(), "hello-world");
    }

    #[test]
    fn session_key_is_stable_per_issue() {
        let repo = RepositoryId::new("octocat/hello-world").unwrap();
        let key = SessionKey::for_issue(&repo, IssueNumber::new(42));
        assert_eq!(key.as_str(), "octocat_hello-world_42");
        assert_eq!(key, SessionKey::for_issue(&repo, IssueNumber::new(42)));
    }
}
