//! GitHub REST adapter: port implementations over `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pipeline::{
    BranchName, CodeRepository, CommentSink, FileEntry, GitHubConfig, GitHubError, InstallationId,
    Issue, IssueNumber, IssueTracker, PullRequest, PullRequestManager, RepositoryId,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::auth::AppAuth;

/// The GitHub App root: owns the credential manager and hands out
/// per-installation clients.
pub struct GitHubApp {
    auth: Arc<AppAuth>,
    api_url: String,
    http: reqwest::Client,
    default_installation: Option<InstallationId>,
}

impl GitHubApp {
    /// Builds the App root from configuration.
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        Ok(Self {
            auth: Arc::new(AppAuth::new(config)?),
            api_url: config.api_url.clone(),
            http: reqwest::Client::new(),
            default_installation: config.default_installation,
        })
    }

    /// Returns a REST client authenticating as `installation`.
    pub fn installation(&self, installation: InstallationId) -> InstallationClient {
        InstallationClient {
            auth: Arc::clone(&self.auth),
            api_url: self.api_url.clone(),
            http: self.http.clone(),
            installation,
        }
    }

    /// The process-wide default installation, when configured.
    pub fn default_installation(&self) -> Option<InstallationId> {
        self.default_installation
    }

    fn resolve(&self, requested: Option<InstallationId>) -> Result<InstallationId, GitHubError> {
        requested
            .or(self.default_installation)
            .ok_or_else(|| GitHubError::Authentication {
                reason: "no installation id on the work item and no process-wide default"
                    .to_string(),
            })
    }
}

#[async_trait]
impl CommentSink for GitHubApp {
    async fn post_comment(
        &self,
        installation: Option<InstallationId>,
        repository: &RepositoryId,
        issue: IssueNumber,
        body: &str,
    ) -> Result<(), GitHubError> {
        let client = self.installation(self.resolve(installation)?);
        client.create_comment(repository, issue, body).await
    }
}

// ---------------------------------------------------------------------------
// Per-installation REST client
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Deserialize)]
struct LabelPayload {
    name: String,
}

#[derive(Deserialize)]
struct IssuePayload {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    user: UserPayload,
    #[serde(default)]
    labels: Vec<LabelPayload>,
    html_url: String,
}

#[derive(Deserialize)]
struct RefPayload {
    object: RefObjectPayload,
}

#[derive(Deserialize)]
struct RefObjectPayload {
    sha: String,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    html_url: String,
    title: String,
    state: String,
}

/// One installation's view of the REST API.
///
/// Every call obtains a token from the credential manager first; the cache
/// makes that cheap.
pub struct InstallationClient {
    auth: Arc<AppAuth>,
    api_url: String,
    http: reqwest::Client,
    installation: InstallationId,
}

impl InstallationClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        operation: &'static str,
        resource: &str,
    ) -> Result<Response, GitHubError> {
        let token = self.auth.installation_token(self.installation).await?;
        let mut request = self
            .http
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, crate::USER_AGENT);
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
            .send()
            .await
            .map_err(|e| GitHubError::api(operation, resource, None, e.to_string()))
    }

    /// Maps a non-success response to [`GitHubError::Api`], preferring
    /// GitHub's own `message` field as the reason.
    async fn error_from(response: Response, operation: &'static str, resource: &str) -> GitHubError {
        let status = response.status().as_u16();
        let reason = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| "request failed".to_string());
        GitHubError::api(operation, resource, Some(status), reason)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: Response,
        operation: &'static str,
        resource: &str,
    ) -> Result<T, GitHubError> {
        response
            .json()
            .await
            .map_err(|e| GitHubError::api(operation, resource, None, format!("malformed response: {e}")))
    }

    /// Fetches the contents entry at `path`, or `None` on 404.
    async fn contents(
        &self,
        repository: &RepositoryId,
        path: &str,
        reference: &str,
        operation: &'static str,
    ) -> Result<Option<serde_json::Value>, GitHubError> {
        let url = format!(
            "/repos/{}/contents/{}?ref={}",
            repository, path, reference
        );
        let response = self.send(Method::GET, &url, None, operation, path).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                Ok(Some(Self::decode(response, operation, path).await?))
            }
            _ => Err(Self::error_from(response, operation, path).await),
        }
    }
}

#[async_trait]
impl IssueTracker for InstallationClient {
    async fn issue(
        &self,
        repository: &RepositoryId,
        number: IssueNumber,
    ) -> Result<Issue, GitHubError> {
        let resource = format!("{repository}#{number}");
        let path = format!("/repos/{}/issues/{}", repository, number);
        let response = self
            .send(Method::GET, &path, None, "get_issue", &resource)
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, "get_issue", &resource).await);
        }
        let payload: IssuePayload = Self::decode(response, "get_issue", &resource).await?;
        Ok(Issue {
            number: IssueNumber::new(payload.number),
            title: payload.title,
            body: payload.body,
            state: payload.state,
            user: payload.user.login,
            labels: payload.labels.into_iter().map(|l| l.name).collect(),
            html_url: payload.html_url,
        })
    }

    async fn create_comment(
        &self,
        repository: &RepositoryId,
        number: IssueNumber,
        body: &str,
    ) -> Result<(), GitHubError> {
        let resource = format!("{repository}#{number}");
        let path = format!("/repos/{}/issues/{}/comments", repository, number);
        let response = self
            .send(
                Method::POST,
                &path,
                Some(serde_json::json!({ "body": body })),
                "create_comment",
                &resource,
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, "create_comment", &resource).await);
        }
        info!(%repository, issue = %number, "posted issue comment");
        Ok(())
    }
}

#[async_trait]
impl CodeRepository for InstallationClient {
    async fn read_file(
        &self,
        repository: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<String, GitHubError> {
        let entry = self
            .contents(repository, path, reference, "read_file")
            .await?
            .ok_or_else(|| {
                GitHubError::api("read_file", path, Some(404), "Not Found")
            })?;
        if entry.is_array() {
            return Err(GitHubError::api(
                "read_file",
                path,
                None,
                "path is a directory, not a file",
            ));
        }
        let encoded = entry
            .get("content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                GitHubError::api("read_file", path, None, "response carries no content")
            })?;
        // GitHub wraps base64 content in newlines
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64.decode(compact).map_err(|e| {
            GitHubError::api("read_file", path, None, format!("invalid base64 content: {e}"))
        })?;
        String::from_utf8(bytes).map_err(|e| {
            GitHubError::api("read_file", path, None, format!("content is not utf-8: {e}"))
        })
    }

    async fn list_files(
        &self,
        repository: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<Vec<FileEntry>, GitHubError> {
        let entry = self
            .contents(repository, path, reference, "list_files")
            .await?
            .ok_or_else(|| {
                GitHubError::api("list_files", path, Some(404), "Not Found")
            })?;
        // A file path yields a single object; present it as a one-entry listing.
        let decode = |value: serde_json::Value| {
            serde_json::from_value(value).map_err(|e| {
                GitHubError::api("list_files", path, None, format!("malformed response: {e}"))
            })
        };
        if entry.is_array() {
            serde_json::from_value(entry).map_err(|e| {
                GitHubError::api("list_files", path, None, format!("malformed response: {e}"))
            })
        } else {
            Ok(vec![decode(entry)?])
        }
    }

    async fn create_branch(
        &self,
        repository: &RepositoryId,
        branch: &BranchName,
        from_reference: &str,
    ) -> Result<(), GitHubError> {
        let ref_path = format!("/repos/{}/git/ref/heads/{}", repository, from_reference);
        let response = self
            .send(Method::GET, &ref_path, None, "create_branch", from_reference)
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, "create_branch", from_reference).await);
        }
        let source: RefPayload =
            Self::decode(response, "create_branch", from_reference).await?;

        let response = self
            .send(
                Method::POST,
                &format!("/repos/{}/git/refs", repository),
                Some(serde_json::json!({
                    "ref": format!("refs/heads/{branch}"),
                    "sha": source.object.sha,
                })),
                "create_branch",
                branch.as_str(),
            )
            .await?;
        match response.status() {
            StatusCode::UNPROCESSABLE_ENTITY => Err(GitHubError::api(
                "create_branch",
                branch.as_str(),
                Some(422),
                format!("branch '{branch}' already exists"),
            )),
            status if status.is_success() => {
                info!(%repository, %branch, from = from_reference, "created branch");
                Ok(())
            }
            _ => Err(Self::error_from(response, "create_branch", branch.as_str()).await),
        }
    }

    async fn update_file(
        &self,
        repository: &RepositoryId,
        path: &str,
        content: &str,
        message: &str,
        branch: &BranchName,
    ) -> Result<(), GitHubError> {
        // Probe for an existing blob: update needs its SHA, create must omit it.
        let existing = self
            .contents(repository, path, branch.as_str(), "update_file")
            .await?;
        let sha = match existing {
            Some(entry) if entry.is_array() => {
                return Err(GitHubError::api(
                    "update_file",
                    path,
                    None,
                    "path is a directory",
                ));
            }
            Some(entry) => entry
                .get("sha")
                .and_then(|s| s.as_str())
                .map(str::to_string),
            None => None,
        };

        let mut body = serde_json::json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": branch.as_str(),
        });
        if let Some(sha) = &sha {
            body["sha"] = serde_json::Value::String(sha.clone());
        }
        let response = self
            .send(
                Method::PUT,
                &format!("/repos/{}/contents/{}", repository, path),
                Some(body),
                "update_file",
                path,
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, "update_file", path).await);
        }
        info!(
            %repository,
            path,
            %branch,
            action = if sha.is_some() { "updated" } else { "created" },
            "wrote file"
        );
        Ok(())
    }
}

#[async_trait]
impl PullRequestManager for InstallationClient {
    async fn create_pull_request(
        &self,
        repository: &RepositoryId,
        title: &str,
        body: &str,
        head: &BranchName,
        base: &str,
    ) -> Result<PullRequest, GitHubError> {
        let response = self
            .send(
                Method::POST,
                &format!("/repos/{}/pulls", repository),
                Some(serde_json::json!({
                    "title": title,
                    "body": body,
                    "head": head.as_str(),
                    "base": base,
                })),
                "create_pull_request",
                repository.as_str(),
            )
            .await?;
        if !response.status().is_success() {
            return Err(
                Self::error_from(response, "create_pull_request", repository.as_str()).await,
            );
        }
        let payload: PullRequestPayload =
            Self::decode(response, "create_pull_request", repository.as_str()).await?;
        info!(%repository, number = payload.number, "opened pull request");
        Ok(PullRequest {
            number: payload.number,
            html_url: payload.html_url,
            title: payload.title,
            state: payload.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    const TEST_PRIVATE_KEY: &str = include_str!("testdata/test_app_key.pem");

    async fn serve(app: Router) -> String {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(socket, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn app_for(routes: Router) -> GitHubApp {
        async fn token() -> Json<serde_json::Value> {
            Json(serde_json::json!({ "token": "ghs_test" }))
        }
        let routes = routes.route("/app/installations/{id}/access_tokens", post(token));
        let api_url = serve(routes).await;
        GitHubApp::new(&GitHubConfig {
            app_id: "12345".to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            default_installation: Some(InstallationId::new(7)),
            api_url,
        })
        .unwrap()
    }

    fn repo() -> RepositoryId {
        RepositoryId::new("octocat/hello-world").unwrap()
    }

    #[tokio::test]
    async fn read_file_decodes_wrapped_base64_content() {
        async fn contents() -> Json<serde_json::Value> {
            // GitHub returns base64 with embedded newlines
            let encoded = format!("{}\n", BASE64.encode("fn main() {}\n"));
            Json(serde_json::json!({
                "name": "main.rs",
                "path": "src/main.rs",
                "type": "file",
                "sha": "abc123",
                "encoding": "base64",
                "content": encoded,
            }))
        }
        let app = app_for(
            Router::new()
                .route("/repos/{owner}/{repo}/contents/{*path}", get(contents)),
        )
        .await;

        let content = app
            .installation(InstallationId::new(7))
            .read_file(&repo(), "src/main.rs", "main")
            .await
            .unwrap();
        assert_eq!(content, "fn main() {}\n");
    }

    #[tokio::test]
    async fn missing_issue_maps_to_api_error_with_operation_and_status() {
        async fn not_found() -> (axum::http::StatusCode, Json<serde_json::Value>) {
            (
                axum::http::StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "message": "Not Found" })),
            )
        }
        let app = app_for(
            Router::new().route("/repos/{owner}/{repo}/issues/{number}", get(not_found)),
        )
        .await;

        let error = app
            .installation(InstallationId::new(7))
            .issue(&repo(), IssueNumber::new(404))
            .await
            .unwrap_err();
        match error {
            GitHubError::Api {
                operation, status, ..
            } => {
                assert_eq!(operation, "get_issue");
                assert_eq!(status, Some(404));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_comment_without_any_installation_fails_before_any_request() {
        let mut app = app_for(Router::new()).await;
        app.default_installation = None;

        let error = app
            .post_comment(None, &repo(), IssueNumber::new(1), "hello")
            .await
            .unwrap_err();
        assert!(matches!(error, GitHubError::Authentication { .. }));
    }

    #[tokio::test]
    async fn post_comment_falls_back_to_the_default_installation() {
        async fn created() -> (axum::http::StatusCode, Json<serde_json::Value>) {
            (
                axum::http::StatusCode::CREATED,
                Json(serde_json::json!({ "id": 1 })),
            )
        }
        let app = app_for(
            Router::new()
                .route("/repos/{owner}/{repo}/issues/{number}/comments", post(created)),
        )
        .await;

        app.post_comment(None, &repo(), IssueNumber::new(1), "🤖 hello")
            .await
            .unwrap();
    }
}
