//! Environment-driven runtime configuration.
//!
//! Each service loads only the sections it needs: the listener never requires
//! App credentials, the worker never requires a webhook secret. Invalid or
//! missing values fail construction with a [`ConfigError`]; the process never
//! starts half-configured.

use crate::errors::ConfigError;
use crate::identifiers::InstallationId;

/// Name of the queue (Redis list / Pub/Sub topic) carrying work items.
pub const WORK_QUEUE_NAME: &str = "agent-requests";

/// Name of the Pub/Sub subscription the worker pulls from.
pub const WORK_QUEUE_SUBSCRIPTION: &str = "agent-requests-sub";

// ---------------------------------------------------------------------------
// GitHub App
// ---------------------------------------------------------------------------

/// Credentials and endpoints for the GitHub App identity.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// App identifier, the `iss` claim of every signed assertion.
    pub app_id: String,
    /// PEM-encoded RSA private key used to sign assertions.
    pub private_key: String,
    /// Process-wide default installation, used when a work item carries none.
    pub default_installation: Option<InstallationId>,
    /// REST API base URL. Overridable for GitHub Enterprise and for tests.
    pub api_url: String,
}

impl GitHubConfig {
    /// Loads from `GITHUB_APP_ID`, `GITHUB_PRIVATE_KEY`,
    /// `GITHUB_INSTALLATION_ID`, and `GITHUB_API_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_id = require_var("GITHUB_APP_ID")?;
        let private_key = require_var("GITHUB_PRIVATE_KEY")?;
        let default_installation = match optional_var("GITHUB_INSTALLATION_ID") {
            Some(raw) => Some(InstallationId::new(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidVar {
                    name: "GITHUB_INSTALLATION_ID",
                    reason: e.to_string(),
                }
            })?)),
            None => None,
        };
        let api_url = optional_var("GITHUB_API_URL")
            .unwrap_or_else(|| "https://api.github.com".to_string());
        Ok(Self {
            app_id,
            private_key,
            default_installation,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------

/// Which broker carries the work queue. Resolved once at process startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    /// Self-hosted Redis list.
    Redis {
        /// Connection URL, e.g. `redis://localhost:6379`.
        url: String,
    },
    /// Google Cloud Pub/Sub topic + subscription.
    PubSub {
        /// GCP project hosting the topic.
        project_id: String,
    },
}

/// Work-queue selection and naming.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// The backend in effect for this process.
    pub backend: QueueBackend,
    /// Queue (list / topic) name.
    pub queue_name: String,
    /// Subscription name (Pub/Sub only).
    pub subscription: String,
}

impl QueueConfig {
    /// Loads from `QUEUE_TYPE` (`redis` default | `pubsub`), `REDIS_URL`
    /// (default `redis://localhost:6379`), and `GCP_PROJECT_ID` (required for
    /// `pubsub`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match optional_var("QUEUE_TYPE").as_deref() {
            None | Some("redis") => QueueBackend::Redis {
                url: optional_var("REDIS_URL")
                    .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            },
            Some("pubsub") => QueueBackend::PubSub {
                project_id: require_var("GCP_PROJECT_ID")?,
            },
            Some(other) => {
                return Err(ConfigError::InvalidVar {
                    name: "QUEUE_TYPE",
                    reason: format!("expected 'redis' or 'pubsub', got '{other}'"),
                })
            }
        };
        Ok(Self {
            backend,
            queue_name: WORK_QUEUE_NAME.to_string(),
            subscription: WORK_QUEUE_SUBSCRIPTION.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Webhook listener
// ---------------------------------------------------------------------------

/// Webhook HTTP service settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// TCP port to bind.
    pub port: u16,
    /// Shared webhook secret. `None` (unset or empty) disables signature
    /// verification — a deliberately permissive default for local
    /// development, not a bug.
    pub webhook_secret: Option<String>,
}

impl ListenerConfig {
    /// Loads from `PORT` (default `8080`) and `GITHUB_WEBHOOK_SECRET`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match optional_var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => 8080,
        };
        Ok(Self {
            port,
            webhook_secret: optional_var("GITHUB_WEBHOOK_SECRET"),
        })
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Agent-capability settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier passed to the provider.
    pub model: String,
}

impl AgentConfig {
    /// Loads from `AGENT_MODEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            model: optional_var("AGENT_MODEL")
                .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Full configuration for the dispatch-worker process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// GitHub App identity.
    pub github: GitHubConfig,
    /// Work-queue selection.
    pub queue: QueueConfig,
    /// Webhook listener settings.
    pub listener: ListenerConfig,
    /// Agent-capability settings.
    pub agent: AgentConfig,
}

impl AppConfig {
    /// Loads every section from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            github: GitHubConfig::from_env()?,
            queue: QueueConfig::from_env()?,
            listener: ListenerConfig::from_env()?,
            agent: AgentConfig::from_env()?,
        })
    }
}

/// Reads a variable, treating unset and empty as absent.
fn optional_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar { name })
}
