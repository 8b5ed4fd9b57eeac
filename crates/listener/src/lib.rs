//! RelayWorks webhook receiver.
//!
//! An HTTP service that verifies inbound signed GitHub events, extracts the
//! `/agent` command from `issue_comment` payloads, and enqueues a work item
//! for the dispatch worker. Per request the flow is a straight line:
//! received → signature-checked → parsed → (command detected? → queued :
//! ignored).
//!
//! The handler answers immediately after the non-blocking enqueue — GitHub
//! enforces short webhook response times and flags slow endpoints — so broker
//! durability is confirmed in the background by the
//! [`queue::BufferedPublisher`] drain task.
//!
//! ## HTTP surface
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | `{"status": "relay_works webhook service is running"}` |
//! | `GET /health` | `{"status": "healthy"}` |
//! | `POST /webhook` | `200 {status: accepted\|ignored}`, `401`, or `500` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, signature verification, and payload
//! shapes live here; the [`pipeline`] crate sees only the published
//! [`pipeline::WorkItem`].

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline::{InstallationId, IssueNumber, QueueError, RepositoryId, WorkItem};
use queue::BufferedPublisher;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod command;
pub mod signature;

pub use command::{parse_command, COMMAND_PREFIX};
pub use signature::{verify_signature, SIGNATURE_HEADER};

/// Header naming the event type of a delivery.
const EVENT_HEADER: &str = "X-GitHub-Event";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures of one webhook request, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing or mismatched delivery signature.
    #[error("Invalid signature")]
    Signature,

    /// The payload is not the JSON shape the event type promises.
    #[error("malformed webhook payload: {0}")]
    Parse(String),

    /// The work item could not be enqueued.
    #[error(transparent)]
    Publish(#[from] QueueError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Signature => StatusCode::UNAUTHORIZED,
            WebhookError::Parse(_) | WebhookError::Publish(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Payload shapes (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    issue: Option<IssuePayload>,
    #[serde(default)]
    comment: Option<CommentPayload>,
    #[serde(default)]
    repository: Option<RepositoryPayload>,
    #[serde(default)]
    installation: Option<InstallationPayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct CommentPayload {
    body: String,
    #[serde(default)]
    user: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: u64,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Shared state of the webhook service.
#[derive(Clone)]
pub struct AppState {
    /// Non-blocking front end of the work queue.
    pub publisher: BufferedPublisher,
    /// Shared webhook secret; `None` disables verification (local dev).
    pub webhook_secret: Option<String>,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

/// Binds `port` on all interfaces and serves until interrupted.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let socket = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "webhook service listening");
    axum::serve(socket, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received; shutting down webhook service");
        })
        .await
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "relay_works webhook service is running" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

fn ignored() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ignored",
        "message": "Not an agent command"
    }))
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WebhookError> {
    // 1. Signature — checked over the raw body, before any parsing.
    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(&body, signature, secret) {
            warn!("webhook delivery rejected: invalid signature");
            return Err(WebhookError::Signature);
        }
    }

    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    info!(event = event_type, "received webhook event");

    // 2. Only freshly created issue comments are examined further.
    let payload: WebhookPayload =
        serde_json::from_slice(&body).map_err(|e| WebhookError::Parse(e.to_string()))?;
    if event_type != "issue_comment" || payload.action.as_deref() != Some("created") {
        return Ok(ignored());
    }

    // 3. Command extraction.
    let comment = payload
        .comment
        .ok_or_else(|| WebhookError::Parse("issue_comment event without comment".to_string()))?;
    let Some(command) = parse_command(&comment.body) else {
        return Ok(ignored());
    };

    // 4. Build and enqueue the work item; durability is confirmed in the
    //    background so the response beats GitHub's delivery timeout.
    let repository = payload
        .repository
        .ok_or_else(|| WebhookError::Parse("issue_comment event without repository".to_string()))
        .and_then(|r| {
            RepositoryId::new(&r.full_name).ok_or_else(|| {
                WebhookError::Parse(format!("invalid repository name '{}'", r.full_name))
            })
        })?;
    let issue = payload
        .issue
        .ok_or_else(|| WebhookError::Parse("issue_comment event without issue".to_string()))?;
    let item = WorkItem::new(
        repository,
        IssueNumber::new(issue.number),
        command,
        comment.user.map(|u| u.login),
        payload.installation.map(|i| InstallationId::new(i.id)),
    )
    .ok_or_else(|| WebhookError::Parse("empty command".to_string()))?;

    info!(
        repository = %item.repository,
        issue = %item.issue_number,
        command = %item.command,
        "agent command detected"
    );
    if let Err(e) = state.publisher.enqueue(item) {
        error!(error = %e, "failed to enqueue work item");
        return Err(WebhookError::Publish(e));
    }

    Ok(Json(serde_json::json!({
        "status": "accepted",
        "message": "Agent is processing your request"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use hmac::Mac;
    use pipeline::{MessageQueue, WorkItemHandler};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Mutex, Notify};
    use tower::util::ServiceExt;

    /// Queue fake; optionally gates publishes behind a notify.
    struct RecordingQueue {
        gated: bool,
        gate: Notify,
        published: Mutex<Vec<WorkItem>>,
    }

    impl RecordingQueue {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                gated,
                gate: Notify::new(),
                published: Mutex::new(Vec::new()),
            })
        }

        async fn wait_for_items(&self, count: usize) -> Vec<WorkItem> {
            for _ in 0..100 {
                let items = self.published.lock().await;
                if items.len() >= count {
                    return items.clone();
                }
                drop(items);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("queue never reached {count} items");
        }
    }

    #[async_trait]
    impl MessageQueue for RecordingQueue {
        async fn publish(&self, item: &WorkItem) -> Result<(), QueueError> {
            if self.gated {
                self.gate.notified().await;
            }
            self.published.lock().await.push(item.clone());
            Ok(())
        }

        async fn subscribe(
            &self,
            _handler: Arc<dyn WorkItemHandler>,
        ) -> Result<(), QueueError> {
            Err(QueueError::Closed)
        }

        async fn close(&self) -> Result<(), QueueError> {
            Ok(())
        }
    }

    fn state_with(queue: Arc<RecordingQueue>, secret: Option<&str>) -> AppState {
        let (publisher, _drain) = BufferedPublisher::spawn(queue, 16);
        AppState {
            publisher,
            webhook_secret: secret.map(str::to_string),
        }
    }

    fn comment_event(body_text: &str) -> Vec<u8> {
        serde_json::json!({
            "action": "created",
            "issue": { "number": 17 },
            "comment": {
                "body": body_text,
                "user": { "login": "octocat" }
            },
            "repository": { "full_name": "octocat/hello-world" },
            "installation": { "id": 42 }
        })
        .to_string()
        .into_bytes()
    }

    fn webhook_request(event: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(EVENT_HEADER, event)
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn agent_comment_is_accepted_and_published() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue.clone(), None));

        let response = app
            .oneshot(webhook_request(
                "issue_comment",
                comment_event("/agent fix the bug\nthanks"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "accepted");

        let items = queue.wait_for_items(1).await;
        assert_eq!(items[0].command, "/agent fix the bug");
        assert_eq!(items[0].repository.as_str(), "octocat/hello-world");
        assert_eq!(items[0].issue_number.as_u64(), 17);
        assert_eq!(items[0].user, "octocat");
        assert_eq!(items[0].installation_id, Some(InstallationId::new(42)));
    }

    #[tokio::test]
    async fn push_events_are_ignored_without_side_effects() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue.clone(), None));

        let response = app
            .oneshot(webhook_request(
                "push",
                br#"{"ref":"refs/heads/main"}"#.to_vec(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ignored");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn comments_without_a_command_are_ignored() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue.clone(), None));

        let response = app
            .oneshot(webhook_request(
                "issue_comment",
                comment_event("nice work everyone"),
            ))
            .await
            .unwrap();

        assert_eq!(body_json(response).await["status"], "ignored");
    }

    #[tokio::test]
    async fn edited_comments_are_ignored() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue, None));

        let mut payload: serde_json::Value =
            serde_json::from_slice(&comment_event("/agent fix the bug")).unwrap();
        payload["action"] = "edited".into();

        let response = app
            .oneshot(webhook_request(
                "issue_comment",
                payload.to_string().into_bytes(),
            ))
            .await
            .unwrap();

        assert_eq!(body_json(response).await["status"], "ignored");
    }

    #[tokio::test]
    async fn missing_signature_is_unauthorized_when_a_secret_is_set() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue, Some("s3cret")));

        let response = app
            .oneshot(webhook_request(
                "issue_comment",
                comment_event("/agent fix the bug"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["detail"], "Invalid signature");
    }

    #[tokio::test]
    async fn valid_signature_is_accepted() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue, Some("s3cret")));

        let body = comment_event("/agent fix the bug");
        let mut mac =
            hmac::Hmac::<sha2::Sha256>::new_from_slice(b"s3cret").unwrap();
        mac.update(&body);
        let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(EVENT_HEADER, "issue_comment")
            .header(SIGNATURE_HEADER, header)
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "accepted");
    }

    #[tokio::test]
    async fn malformed_json_is_a_500_with_detail() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue, None));

        let response = app
            .oneshot(webhook_request("issue_comment", b"not json".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn response_returns_before_broker_durability() {
        let queue = RecordingQueue::new(true);
        let app = router(state_with(queue.clone(), None));

        let response = app
            .oneshot(webhook_request(
                "issue_comment",
                comment_event("/agent fix the bug"),
            ))
            .await
            .unwrap();

        // accepted while the broker publish is still gated
        assert_eq!(response.status(), StatusCode::OK);
        assert!(queue.published.lock().await.is_empty());

        queue.gate.notify_one();
        let items = queue.wait_for_items(1).await;
        assert_eq!(items[0].command, "/agent fix the bug");
    }

    #[tokio::test]
    async fn health_and_root_respond() {
        let queue = RecordingQueue::new(false);
        let app = router(state_with(queue, None));

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_json(health).await["status"], "healthy");

        let root = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(root).await["status"],
            "relay_works webhook service is running"
        );
    }
}
