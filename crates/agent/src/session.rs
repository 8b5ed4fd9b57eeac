//! Per-issue conversation sessions.
//!
//! A session is keyed by repository + issue number so repeated `/agent`
//! invocations on one issue share conversational context. Creation is
//! idempotent per key; asking for an existing session returns the same
//! history.

use std::collections::HashMap;
use std::sync::Arc;

use pipeline::SessionKey;
use rig::completion::Message;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared, lockable conversation history of one session.
pub type SessionHistory = Arc<Mutex<Vec<Message>>>;

/// Registry of live sessions for this process.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, SessionHistory>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `key`, creating it on first use.
    pub async fn ensure(&self, key: &SessionKey) -> SessionHistory {
        let mut sessions = self.sessions.lock().await;
        if let Some(history) = sessions.get(key) {
            return Arc::clone(history);
        }
        debug!(session = %key, "created agent session");
        let history: SessionHistory = Arc::new(Mutex::new(Vec::new()));
        sessions.insert(key.clone(), Arc::clone(&history));
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{IssueNumber, RepositoryId};

    fn key(issue: u64) -> SessionKey {
        SessionKey::for_issue(
            &RepositoryId::new("octocat/hello-world").unwrap(),
            IssueNumber::new(issue),
        )
    }

    #[tokio::test]
    async fn ensure_is_idempotent_per_key() {
        let store = SessionStore::new();
        let first = store.ensure(&key(1)).await;
        let second = store.ensure(&key(1)).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn distinct_issues_get_distinct_sessions() {
        let store = SessionStore::new();
        let a = store.ensure(&key(1)).await;
        let b = store.ensure(&key(2)).await;
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn history_survives_between_invocations() {
        let store = SessionStore::new();
        {
            let history = store.ensure(&key(1)).await;
            history.lock().await.push(Message::user("first request"));
        }
        let history = store.ensure(&key(1)).await;
        assert_eq!(history.lock().await.len(), 1);
    }
}
