//! The agent's declared tool set.
//!
//! A static table of tools over the GitHub ports plus a URL fetcher. Every
//! tool checks the invoking identity's permission before dispatch; a denial
//! is returned to the model as a failed tool call, so the conversation
//! continues instead of the process crashing.

use std::sync::Arc;

use pipeline::{
    BranchName, CodeRepository, GitHubError, IssueNumber, IssueTracker, PermissionError,
    PullRequestManager, RepositoryId,
};
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::permissions::{Permission, PermissionTable};

/// Cap on fetched page size handed back to the model.
const FETCH_MAX_CHARS: usize = 50_000;

/// Everything a tool call needs: the GitHub ports, the permission table, and
/// the identity the calls run as.
pub struct GitHubToolset {
    pub issues: Arc<dyn IssueTracker>,
    pub code: Arc<dyn CodeRepository>,
    pub prs: Arc<dyn PullRequestManager>,
    pub permissions: PermissionTable,
    pub agent_id: String,
    http: reqwest::Client,
}

impl GitHubToolset {
    pub fn new(
        issues: Arc<dyn IssueTracker>,
        code: Arc<dyn CodeRepository>,
        prs: Arc<dyn PullRequestManager>,
        permissions: PermissionTable,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            issues,
            code,
            prs,
            permissions,
            agent_id: agent_id.into(),
            http: reqwest::Client::new(),
        }
    }

    fn check(&self, permission: Permission) -> Result<(), ToolError> {
        self.permissions.check(&self.agent_id, permission)?;
        debug!(agent = %self.agent_id, %permission, "tool call permitted");
        Ok(())
    }
}

/// Failure of one tool call, rendered back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Permission denied: {0}")]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error("invalid tool arguments: {0}")]
    InvalidArgs(String),
    #[error("fetch_url failed: {0}")]
    Fetch(String),
}

fn parse_repo(raw: &str) -> Result<RepositoryId, ToolError> {
    RepositoryId::new(raw)
        .ok_or_else(|| ToolError::InvalidArgs(format!("'{raw}' is not of the form owner/repo")))
}

fn parse_branch(raw: &str) -> Result<BranchName, ToolError> {
    BranchName::new(raw).ok_or_else(|| ToolError::InvalidArgs("branch name is empty".to_string()))
}

fn render<T: serde::Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value).map_err(|e| ToolError::InvalidArgs(e.to_string()))
}

fn default_ref() -> String {
    "main".to_string()
}

// ---------------------------------------------------------------------------
// get_issue
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetIssueArgs {
    pub repo: String,
    pub issue_number: u64,
}

pub struct GetIssue(pub Arc<GitHubToolset>);

impl Tool for GetIssue {
    const NAME: &'static str = "get_issue";
    type Error = ToolError;
    type Args = GetIssueArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get details of a GitHub issue".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string", "description": "Repository in format 'owner/repo'" },
                    "issue_number": { "type": "integer", "description": "Issue number" }
                },
                "required": ["repo", "issue_number"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::GetIssue)?;
        let repo = parse_repo(&args.repo)?;
        let issue = self
            .0
            .issues
            .issue(&repo, IssueNumber::new(args.issue_number))
            .await?;
        render(&issue)
    }
}

// ---------------------------------------------------------------------------
// list_files
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListFilesArgs {
    pub repo: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_ref", rename = "ref")]
    pub reference: String,
}

pub struct ListFiles(pub Arc<GitHubToolset>);

impl Tool for ListFiles {
    const NAME: &'static str = "list_files";
    type Error = ToolError;
    type Args = ListFilesArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List files in a directory of a GitHub repository".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string", "description": "Repository in format 'owner/repo'" },
                    "path": { "type": "string", "description": "Directory path (empty for root)", "default": "" },
                    "ref": { "type": "string", "description": "Branch, tag, or commit SHA (default: main)", "default": "main" }
                },
                "required": ["repo"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::ListFiles)?;
        let repo = parse_repo(&args.repo)?;
        let entries = self
            .0
            .code
            .list_files(&repo, &args.path, &args.reference)
            .await?;
        render(&entries)
    }
}

// ---------------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReadFileArgs {
    pub repo: String,
    pub path: String,
    #[serde(default = "default_ref", rename = "ref")]
    pub reference: String,
}

pub struct ReadFile(pub Arc<GitHubToolset>);

impl Tool for ReadFile {
    const NAME: &'static str = "read_file";
    type Error = ToolError;
    type Args = ReadFileArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Read a file from a GitHub repository".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string", "description": "Repository in format 'owner/repo'" },
                    "path": { "type": "string", "description": "Path to the file" },
                    "ref": { "type": "string", "description": "Branch, tag, or commit SHA (default: main)", "default": "main" }
                },
                "required": ["repo", "path"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::ReadFile)?;
        let repo = parse_repo(&args.repo)?;
        Ok(self
            .0
            .code
            .read_file(&repo, &args.path, &args.reference)
            .await?)
    }
}

// ---------------------------------------------------------------------------
// create_branch
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBranchArgs {
    pub repo: String,
    pub branch_name: String,
    #[serde(default = "default_ref")]
    pub from_ref: String,
}

pub struct CreateBranch(pub Arc<GitHubToolset>);

impl Tool for CreateBranch {
    const NAME: &'static str = "create_branch";
    type Error = ToolError;
    type Args = CreateBranchArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Create a new branch in a GitHub repository".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string", "description": "Repository in format 'owner/repo'" },
                    "branch_name": { "type": "string", "description": "Name for the new branch" },
                    "from_ref": { "type": "string", "description": "Source branch/ref (default: main)", "default": "main" }
                },
                "required": ["repo", "branch_name"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::CreateBranch)?;
        let repo = parse_repo(&args.repo)?;
        let branch = parse_branch(&args.branch_name)?;
        self.0
            .code
            .create_branch(&repo, &branch, &args.from_ref)
            .await?;
        Ok(format!("Successfully created branch '{branch}'"))
    }
}

// ---------------------------------------------------------------------------
// update_file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateFileArgs {
    pub repo: String,
    pub path: String,
    pub content: String,
    pub message: String,
    pub branch: String,
}

pub struct UpdateFile(pub Arc<GitHubToolset>);

impl Tool for UpdateFile {
    const NAME: &'static str = "update_file";
    type Error = ToolError;
    type Args = UpdateFileArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Create or update a file in a GitHub repository".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string", "description": "Repository in format 'owner/repo'" },
                    "path": { "type": "string", "description": "Path to the file" },
                    "content": { "type": "string", "description": "File content" },
                    "message": { "type": "string", "description": "Commit message" },
                    "branch": { "type": "string", "description": "Branch to commit to" }
                },
                "required": ["repo", "path", "content", "message", "branch"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::UpdateFile)?;
        let repo = parse_repo(&args.repo)?;
        let branch = parse_branch(&args.branch)?;
        self.0
            .code
            .update_file(&repo, &args.path, &args.content, &args.message, &branch)
            .await?;
        Ok(format!("Wrote file '{}' on branch '{branch}'", args.path))
    }
}

// ---------------------------------------------------------------------------
// create_pull_request
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestArgs {
    pub repo: String,
    pub title: String,
    pub body: String,
    pub head: String,
    #[serde(default = "default_ref")]
    pub base: String,
}

pub struct CreatePullRequest(pub Arc<GitHubToolset>);

impl Tool for CreatePullRequest {
    const NAME: &'static str = "create_pull_request";
    type Error = ToolError;
    type Args = CreatePullRequestArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Create a pull request in a GitHub repository".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string", "description": "Repository in format 'owner/repo'" },
                    "title": { "type": "string", "description": "PR title" },
                    "body": { "type": "string", "description": "PR description" },
                    "head": { "type": "string", "description": "Branch containing changes" },
                    "base": { "type": "string", "description": "Base branch (default: main)", "default": "main" }
                },
                "required": ["repo", "title", "body", "head"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::CreatePullRequest)?;
        let repo = parse_repo(&args.repo)?;
        let head = parse_branch(&args.head)?;
        let pr = self
            .0
            .prs
            .create_pull_request(&repo, &args.title, &args.body, &head, &args.base)
            .await?;
        render(&pr)
    }
}

// ---------------------------------------------------------------------------
// fetch_url
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FetchUrlArgs {
    pub url: String,
}

pub struct FetchUrl(pub Arc<GitHubToolset>);

impl Tool for FetchUrl {
    const NAME: &'static str = "fetch_url";
    type Error = ToolError;
    type Args = FetchUrlArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Fetch the content of a URL for research".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL to fetch" }
                },
                "required": ["url"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.0.check(Permission::FetchUrl)?;
        let response = self
            .0
            .http
            .get(&args.url)
            .send()
            .await
            .map_err(|e| ToolError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Fetch(format!("'{}' returned {status}", args.url)));
        }
        let mut text = response
            .text()
            .await
            .map_err(|e| ToolError::Fetch(e.to_string()))?;
        if text.len() > FETCH_MAX_CHARS {
            let mut end = FETCH_MAX_CHARS;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
            text.push_str("\n… [truncated]");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::AgentRole;
    use async_trait::async_trait;
    use pipeline::{FileEntry, Issue, PullRequest};
    use tokio::sync::Mutex;

    struct FakeGitHub {
        pull_requests: Mutex<Vec<String>>,
    }

    impl FakeGitHub {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                pull_requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl IssueTracker for FakeGitHub {
        async fn issue(
            &self,
            _repository: &RepositoryId,
            number: IssueNumber,
        ) -> Result<Issue, GitHubError> {
            Ok(Issue {
                number,
                title: "Login button missing".to_string(),
                body: Some("The login button vanished after the redesign.".to_string()),
                state: "open".to_string(),
                user: "octocat".to_string(),
                labels: vec!["bug".to_string()],
                html_url: "https://github.com/octocat/hello-world/issues/12".to_string(),
            })
        }

        async fn create_comment(
            &self,
            _repository: &RepositoryId,
            _number: IssueNumber,
            _body: &str,
        ) -> Result<(), GitHubError> {
            Ok(())
        }
    }

    #[async_trait]
    impl CodeRepository for FakeGitHub {
        async fn read_file(
            &self,
            _repository: &RepositoryId,
            _path: &str,
            _reference: &str,
        ) -> Result<String, GitHubError> {
            Ok("fn main() {}\n".to_string())
        }

        async fn list_files(
            &self,
            _repository: &RepositoryId,
            _path: &str,
            _reference: &str,
        ) -> Result<Vec<FileEntry>, GitHubError> {
            Ok(Vec::new())
        }

        async fn create_branch(
            &self,
            _repository: &RepositoryId,
            _branch: &BranchName,
            _from_reference: &str,
        ) -> Result<(), GitHubError> {
            Ok(())
        }

        async fn update_file(
            &self,
            _repository: &RepositoryId,
            _path: &str,
            _content: &str,
            _message: &str,
            _branch: &BranchName,
        ) -> Result<(), GitHubError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PullRequestManager for FakeGitHub {
        async fn create_pull_request(
            &self,
            _repository: &RepositoryId,
            title: &str,
            _body: &str,
            _head: &BranchName,
            _base: &str,
        ) -> Result<PullRequest, GitHubError> {
            self.pull_requests.lock().await.push(title.to_string());
            Ok(PullRequest {
                number: 99,
                html_url: "https://github.com/octocat/hello-world/pull/99".to_string(),
                title: title.to_string(),
                state: "open".to_string(),
            })
        }
    }

    fn toolset(role: AgentRole) -> (Arc<GitHubToolset>, Arc<FakeGitHub>) {
        let fake = FakeGitHub::new();
        let toolset = Arc::new(GitHubToolset::new(
            fake.clone(),
            fake.clone(),
            fake.clone(),
            PermissionTable::with_agent("bot", role),
            "bot",
        ));
        (toolset, fake)
    }

    #[tokio::test]
    async fn get_issue_renders_the_issue_as_json() {
        let (toolset, _) = toolset(AgentRole::Reader);
        let output = GetIssue(toolset)
            .call(GetIssueArgs {
                repo: "octocat/hello-world".to_string(),
                issue_number: 12,
            })
            .await
            .unwrap();
        assert!(output.contains("Login button missing"));
    }

    #[tokio::test]
    async fn reader_gets_a_rejected_tool_call_for_create_branch() {
        let (toolset, _) = toolset(AgentRole::Reader);
        let error = CreateBranch(toolset)
            .call(CreateBranchArgs {
                repo: "octocat/hello-world".to_string(),
                branch_name: "feature/login".to_string(),
                from_ref: "main".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::Permission(_)));
        assert!(error.to_string().starts_with("Permission denied"));
    }

    #[tokio::test]
    async fn contributor_can_open_a_pull_request() {
        let (toolset, fake) = toolset(AgentRole::Contributor);
        let output = CreatePullRequest(toolset)
            .call(CreatePullRequestArgs {
                repo: "octocat/hello-world".to_string(),
                title: "Fix login button".to_string(),
                body: "Fixes #12".to_string(),
                head: "feature/login".to_string(),
                base: "main".to_string(),
            })
            .await
            .unwrap();
        assert!(output.contains("\"number\": 99"));
        assert_eq!(fake.pull_requests.lock().await.as_slice(), &["Fix login button"]);
    }

    #[tokio::test]
    async fn malformed_repo_is_an_argument_error_not_a_github_call() {
        let (toolset, _) = toolset(AgentRole::Contributor);
        let error = ReadFile(toolset)
            .call(ReadFileArgs {
                repo: "not-a-full-name".to_string(),
                path: "src/main.rs".to_string(),
                reference: "main".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::InvalidArgs(_)));
    }
}
