//! GitHub App credential manager.
//!
//! Authenticating as a GitHub App is a two-step dance: sign a short-lived
//! RS256 assertion with the App's private key, then exchange it for an
//! installation access token. Tokens are cached per installation id and
//! reused only while they keep a safety margin of validity; assertions are
//! never cached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pipeline::{GitHubConfig, GitHubError, InstallationId};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A cached token is reused only while more than this much validity remains,
/// covering clock skew and requests already in flight.
const TOKEN_REUSE_MARGIN_SECS: i64 = 300;

/// Tokens are treated as living 55 minutes even though GitHub grants 60.
const CACHED_TOKEN_LIFETIME_SECS: i64 = 55 * 60;

/// Assertions are backdated to tolerate clock drift between us and GitHub.
const ASSERTION_BACKDATE_SECS: i64 = 60;

/// Assertion validity window.
const ASSERTION_LIFETIME_SECS: i64 = 10 * 60;

/// An installation access token plus the moment we stop trusting it.
///
/// Owned exclusively by [`AppAuth`]; entries are never evicted, staleness is
/// checked lazily on each access.
#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_reusable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(TOKEN_REUSE_MARGIN_SECS)
    }
}

/// Claims of the App assertion. Regenerated for every exchange.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    token: String,
}

/// Signs App assertions and manages the installation-token cache.
///
/// Safe under concurrent calls: the cache map sits behind a read/write lock,
/// and refreshes serialise per installation id only, so unrelated
/// installations never wait on each other.
pub struct AppAuth {
    app_id: String,
    signing_key: EncodingKey,
    api_url: String,
    http: reqwest::Client,
    cache: RwLock<HashMap<InstallationId, CachedToken>>,
    refresh_locks: Mutex<HashMap<InstallationId, Arc<Mutex<()>>>>,
}

impl AppAuth {
    /// Builds the credential manager from App configuration.
    ///
    /// Fails if the private key is not a usable RSA PEM.
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let signing_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes()).map_err(|e| {
            GitHubError::Authentication {
                reason: format!("invalid App private key: {e}"),
            }
        })?;
        Ok(Self {
            app_id: config.app_id.clone(),
            signing_key,
            api_url: config.api_url.clone(),
            http: reqwest::Client::new(),
            cache: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Returns a valid installation token, refreshing if the cached one has
    /// 300 seconds or less of validity left.
    ///
    /// Exchange failures propagate uncaught; retrying internally with a stale
    /// or invalid key would be pointless, so the caller decides.
    pub async fn installation_token(
        &self,
        installation: InstallationId,
    ) -> Result<String, GitHubError> {
        if let Some(token) = self.cached(installation, Utc::now()).await {
            return Ok(token);
        }

        let lock = self.refresh_lock(installation).await;
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited for the per-key lock.
        if let Some(token) = self.cached(installation, Utc::now()).await {
            return Ok(token);
        }

        let token = self.exchange(installation).await?;
        self.cache.write().await.insert(
            installation,
            CachedToken {
                token: token.clone(),
                expires_at: Utc::now() + Duration::seconds(CACHED_TOKEN_LIFETIME_SECS),
            },
        );
        info!(%installation, "refreshed installation token");
        Ok(token)
    }

    async fn cached(&self, installation: InstallationId, now: DateTime<Utc>) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .get(&installation)
            .filter(|entry| entry.is_reusable_at(now))
            .map(|entry| entry.token.clone())
    }

    async fn refresh_lock(&self, installation: InstallationId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        Arc::clone(locks.entry(installation).or_default())
    }

    /// Signs a fresh assertion: backdated `iat`, ten-minute `exp`, App id as
    /// `iss`. Never cached.
    fn signed_assertion(&self) -> Result<String, GitHubError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iat: now - ASSERTION_BACKDATE_SECS,
            exp: now + ASSERTION_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key).map_err(
            |e| GitHubError::Authentication {
                reason: format!("assertion signing failed: {e}"),
            },
        )
    }

    async fn exchange(&self, installation: InstallationId) -> Result<String, GitHubError> {
        let assertion = self.signed_assertion()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation
        );
        debug!(%installation, "exchanging assertion for installation token");
        let response = self
            .http
            .post(&url)
            .bearer_auth(assertion)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|e| GitHubError::Authentication {
                reason: format!("token exchange request failed: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Authentication {
                reason: format!("token exchange returned {status}: {body}"),
            });
        }
        let exchanged: TokenExchangeResponse =
            response
                .json()
                .await
                .map_err(|e| GitHubError::Authentication {
                    reason: format!("malformed token exchange response: {e}"),
                })?;
        Ok(exchanged.token)
    }
}
