//! Role-based permission gating for agent tool calls.
//!
//! A static table maps each agent identity to a role and each role to the
//! tool permissions it grants. Every tool checks here before dispatch; a
//! denial is a rejected tool call reported back to the model, never a crash.

use std::collections::HashMap;

use pipeline::PermissionError;
use serde::{Deserialize, Serialize};

/// One grantable tool capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadFile,
    ListFiles,
    GetIssue,
    CreateBranch,
    UpdateFile,
    CreatePullRequest,
    MergePullRequest,
    CreateIssue,
    AddLabel,
    FetchUrl,
}

impl Permission {
    /// The permission's wire/tool name.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ReadFile => "read_file",
            Permission::ListFiles => "list_files",
            Permission::GetIssue => "get_issue",
            Permission::CreateBranch => "create_branch",
            Permission::UpdateFile => "update_file",
            Permission::CreatePullRequest => "create_pull_request",
            Permission::MergePullRequest => "merge_pull_request",
            Permission::CreateIssue => "create_issue",
            Permission::AddLabel => "add_label",
            Permission::FetchUrl => "fetch_url",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Predefined agent roles, least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Reader,
    Contributor,
    Maintainer,
    Admin,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentRole::Reader => "reader",
            AgentRole::Contributor => "contributor",
            AgentRole::Maintainer => "maintainer",
            AgentRole::Admin => "admin",
        };
        write!(f, "{name}")
    }
}

const READER_PERMISSIONS: &[Permission] = &[
    Permission::ReadFile,
    Permission::ListFiles,
    Permission::GetIssue,
    Permission::FetchUrl,
];

const CONTRIBUTOR_PERMISSIONS: &[Permission] = &[
    Permission::ReadFile,
    Permission::ListFiles,
    Permission::GetIssue,
    Permission::FetchUrl,
    Permission::CreateBranch,
    Permission::UpdateFile,
    Permission::CreatePullRequest,
];

const MAINTAINER_PERMISSIONS: &[Permission] = &[
    Permission::ReadFile,
    Permission::ListFiles,
    Permission::GetIssue,
    Permission::FetchUrl,
    Permission::CreateBranch,
    Permission::UpdateFile,
    Permission::CreatePullRequest,
    Permission::MergePullRequest,
    Permission::CreateIssue,
    Permission::AddLabel,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ReadFile,
    Permission::ListFiles,
    Permission::GetIssue,
    Permission::FetchUrl,
    Permission::CreateBranch,
    Permission::UpdateFile,
    Permission::CreatePullRequest,
    Permission::MergePullRequest,
    Permission::CreateIssue,
    Permission::AddLabel,
];

/// The permissions a role grants.
pub fn role_permissions(role: AgentRole) -> &'static [Permission] {
    match role {
        AgentRole::Reader => READER_PERMISSIONS,
        AgentRole::Contributor => CONTRIBUTOR_PERMISSIONS,
        AgentRole::Maintainer => MAINTAINER_PERMISSIONS,
        AgentRole::Admin => ADMIN_PERMISSIONS,
    }
}

/// Maps agent identities to roles.
///
/// Unknown identities resolve to [`AgentRole::Reader`], the most restrictive
/// role.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    roles: HashMap<String, AgentRole>,
}

impl PermissionTable {
    /// A table with one identity registered at the given role.
    pub fn with_agent(agent: impl Into<String>, role: AgentRole) -> Self {
        let mut roles = HashMap::new();
        roles.insert(agent.into(), role);
        Self { roles }
    }

    /// Registers or reassigns an identity.
    pub fn set_role(&mut self, agent: impl Into<String>, role: AgentRole) {
        self.roles.insert(agent.into(), role);
    }

    /// The role an identity resolves to.
    pub fn role_of(&self, agent: &str) -> AgentRole {
        self.roles.get(agent).copied().unwrap_or(AgentRole::Reader)
    }

    /// Returns `true` if `agent`'s role grants `permission`.
    pub fn allows(&self, agent: &str, permission: Permission) -> bool {
        role_permissions(self.role_of(agent)).contains(&permission)
    }

    /// Checks a permission, producing the error a denied tool call reports.
    pub fn check(&self, agent: &str, permission: Permission) -> Result<(), PermissionError> {
        if self.allows(agent, permission) {
            Ok(())
        } else {
            Err(PermissionError {
                agent: agent.to_string(),
                role: self.role_of(agent).to_string(),
                permission: permission.to_string(),
            })
        }
    }

    /// Every permission granted to `agent`.
    pub fn permissions_of(&self, agent: &str) -> &'static [Permission] {
        role_permissions(self.role_of(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_cannot_create_branches() {
        let table = PermissionTable::with_agent("bot", AgentRole::Reader);
        assert!(!table.allows("bot", Permission::CreateBranch));
        let error = table.check("bot", Permission::CreateBranch).unwrap_err();
        assert_eq!(error.role, "reader");
        assert_eq!(error.permission, "create_branch");
    }

    #[test]
    fn contributor_can_open_pull_requests_but_not_merge() {
        let table = PermissionTable::with_agent("bot", AgentRole::Contributor);
        assert!(table.check("bot", Permission::CreatePullRequest).is_ok());
        assert!(table.check("bot", Permission::MergePullRequest).is_err());
    }

    #[test]
    fn admin_holds_every_permission() {
        let table = PermissionTable::with_agent("bot", AgentRole::Admin);
        for permission in role_permissions(AgentRole::Maintainer) {
            assert!(table.allows("bot", *permission));
        }
    }

    #[test]
    fn unknown_identities_fall_back_to_reader() {
        let table = PermissionTable::with_agent("bot", AgentRole::Admin);
        assert_eq!(table.role_of("stranger"), AgentRole::Reader);
        assert!(table.check("stranger", Permission::UpdateFile).is_err());
        assert!(table.check("stranger", Permission::GetIssue).is_ok());
    }
}
