//! RelayWorks agent-capability infrastructure adapter.
//!
//! Implements the [`pipeline::AgentCapability`] port over `rig-core`'s
//! Anthropic provider. The model reasons and decides which of the declared
//! tools to invoke; this crate only supplies the harness:
//!
//! - [`tools`] — the static tool table (GitHub operations + URL fetch), each
//!   entry gated by the invoking identity's permission before dispatch.
//! - [`permissions`] — the role-based permission table.
//! - [`session`] — per-issue conversation sessions so repeated invocations
//!   for one issue share context.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Provider transport, tool schemas, and conversation
//! bookkeeping live here. The [`pipeline`] crate sees only
//! [`pipeline::AgentCapability`].

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{AgentCapability, AgentConfig, AgentError, AgentResponse, SessionKey};
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::anthropic;
use tracing::{debug, info};

pub mod permissions;
pub mod session;
pub mod tools;

pub use permissions::{AgentRole, Permission, PermissionTable};
pub use tools::{GitHubToolset, ToolError};

use session::SessionStore;

/// The identity tool calls run as; registered as a contributor by default.
pub const AGENT_ID: &str = "RelayWorksAgent";

/// Upper bound on tool-call round trips within one invocation.
const MAX_TOOL_TURNS: usize = 24;

const SYSTEM_INSTRUCTION: &str = "\
You are RelayWorks, an AI assistant that helps developers with GitHub tasks.

When a user asks you to work on an issue, follow these steps:
1. Use get_issue to understand the issue details
2. Use list_files and read_file to explore the repository
3. Create a new branch using create_branch with a descriptive name (e.g. \"feature/add-login-button\")
4. Make necessary file changes using update_file
5. Create a pull request using create_pull_request

IMPORTANT: If the user just wants a simple response (like \"ping/pong\"), just respond with text - don't create branches or PRs.

Always:
- Use clear, descriptive branch names
- Write meaningful commit messages
- Include \"Fixes #<issue_number>\" in PR descriptions
- Explain what you're doing at each step

You have access to fetch_url for research when needed.";

/// The Anthropic-backed agent capability with the GitHub toolset attached.
pub struct ToolAgent {
    agent: rig::agent::Agent<anthropic::completion::CompletionModel>,
    sessions: SessionStore,
}

impl ToolAgent {
    /// Builds the capability, reading provider credentials from
    /// `ANTHROPIC_API_KEY`.
    pub fn from_env(config: &AgentConfig, toolset: GitHubToolset) -> Result<Self, AgentError> {
        if std::env::var("ANTHROPIC_API_KEY")
            .map(|v| v.is_empty())
            .unwrap_or(true)
        {
            return Err(AgentError::Provider {
                reason: "ANTHROPIC_API_KEY is not set".to_string(),
            });
        }
        let client = anthropic::Client::from_env();
        let toolset = Arc::new(toolset);
        let agent = client
            .agent(&config.model)
            .preamble(SYSTEM_INSTRUCTION)
            .max_tokens(8192)
            .tool(tools::GetIssue(Arc::clone(&toolset)))
            .tool(tools::ListFiles(Arc::clone(&toolset)))
            .tool(tools::ReadFile(Arc::clone(&toolset)))
            .tool(tools::CreateBranch(Arc::clone(&toolset)))
            .tool(tools::UpdateFile(Arc::clone(&toolset)))
            .tool(tools::CreatePullRequest(Arc::clone(&toolset)))
            .tool(tools::FetchUrl(toolset))
            .build();
        info!(model = %config.model, "agent capability ready");
        Ok(Self {
            agent,
            sessions: SessionStore::new(),
        })
    }
}

#[async_trait]
impl AgentCapability for ToolAgent {
    async fn run(&self, session: &SessionKey, prompt: &str) -> Result<AgentResponse, AgentError> {
        let history = self.sessions.ensure(session).await;
        let mut log = history.lock().await;
        debug!(session = %session, turns = log.len(), "invoking agent");
        // multi_turn drains the provider's event stream; the returned text is
        // the response marked final.
        let text = self
            .agent
            .prompt(prompt)
            .with_history(&mut log)
            .max_turns(MAX_TOOL_TURNS)
            .await
            .map_err(|e| AgentError::Provider {
                reason: e.to_string(),
            })?;
        Ok(AgentResponse { text })
    }
}
