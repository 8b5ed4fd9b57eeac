//! RelayWorks GitHub infrastructure adapter.
//!
//! Implements the GitHub-facing ports defined in the [`pipeline`] crate
//! (`IssueTracker`, `CodeRepository`, `PullRequestManager`, `CommentSink`)
//! against the GitHub REST API, authenticating as a GitHub App.
//!
//! - [`auth::AppAuth`] — the credential manager: signs short-lived RS256
//!   assertions and caches installation access tokens per installation id.
//! - [`api::GitHubApp`] — the App root: hands out per-installation clients
//!   and posts worker comments with the right installation's token.
//! - [`api::InstallationClient`] — one installation's REST client,
//!   implementing the port traits.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. All GitHub
//! API details (authentication, encoding, status mapping) are handled here;
//! the [`pipeline`] crate never sees them.

pub mod api;
pub mod auth;

/// User-Agent sent on every request; GitHub rejects requests without one.
pub(crate) const USER_AGENT: &str = concat!("relay-works/", env!("CARGO_PKG_VERSION"));

pub use api::{GitHubApp, InstallationClient};
pub use auth::AppAuth;
