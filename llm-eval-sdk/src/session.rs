//! Sessions against the identity provider.
//!
//! The identity provider is used through its token API only:
//! `POST /token?grant_type=password`, `POST /token?grant_type=refresh_token`,
//! `POST /logout` and `GET /user`. A [`SessionManager`] holds the current
//! session, lets callers subscribe to changes, and hands out access tokens
//! to the [`HttpClient`] through the [`TokenSource`] trait.

use crate::client::HttpClient;
use crate::config::{AuthConfig, SdkConfig};
use crate::error::{SdkError, SdkResult};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use llm_eval_core::domain::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Supplies the bearer token for authenticated requests.
#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    async fn access_token(&self) -> SdkResult<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= Utc::now()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
            .or_else(|| jwt_expiry(&self.access_token))
            .unwrap_or_else(Utc::now);
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Reads the `exp` claim of a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}

/// Client for the identity provider's token API.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: HttpClient,
}

impl IdentityClient {
    /// `public_key` is sent as the `apikey` header on every call.
    pub fn new(identity_url: impl Into<String>, public_key: impl Into<String>) -> SdkResult<Self> {
        let config = SdkConfig::new(identity_url).with_header("apikey", public_key);
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> SdkResult<Session> {
        let body = serde_json::json!({ "email": email, "password": password });
        let tokens: TokenResponse = self
            .http
            .post_with_query("/token", &body, &[("grant_type", "password")])
            .await?;
        Ok(tokens.into_session())
    }

    pub async fn refresh(&self, refresh_token: &str) -> SdkResult<Session> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let tokens: TokenResponse = self
            .http
            .post_with_query("/token", &body, &[("grant_type", "refresh_token")])
            .await?;
        Ok(tokens.into_session())
    }

    pub async fn sign_out(&self, access_token: &str) -> SdkResult<()> {
        self.http
            .with_auth(AuthConfig::BearerToken(access_token.to_string()))
            .post_no_response("/logout", &serde_json::json!({}))
            .await
    }

    pub async fn get_user(&self, access_token: &str) -> SdkResult<User> {
        self.http
            .with_auth(AuthConfig::BearerToken(access_token.to_string()))
            .get("/user")
            .await
    }
}

/// Holds the current session and publishes every change.
#[derive(Debug)]
pub struct SessionManager {
    identity: IdentityClient,
    session: RwLock<Option<Session>>,
    changes: watch::Sender<Option<Session>>,
}

impl SessionManager {
    pub fn new(identity: IdentityClient) -> Self {
        Self::with_session(identity, None)
    }

    /// Starts from a previously persisted session.
    pub fn with_session(identity: IdentityClient, session: Option<Session>) -> Self {
        let (changes, _) = watch::channel(session.clone());
        Self {
            identity,
            session: RwLock::new(session),
            changes,
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Receives the new session (or `None`) on every sign-in, refresh and
    /// sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.changes.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SdkResult<Session> {
        let session = self.identity.sign_in_with_password(email, password).await?;
        info!(user = %session.user.id, "signed in");
        self.set(Some(session.clone())).await;
        Ok(session)
    }

    /// Exchanges the refresh token for a new session.
    pub async fn refresh(&self) -> SdkResult<Session> {
        let refresh_token = self
            .current()
            .await
            .map(|s| s.refresh_token)
            .ok_or_else(|| SdkError::NotAuthenticated("no session to refresh".to_string()))?;
        let session = self.identity.refresh(&refresh_token).await?;
        debug!(expires_at = %session.expires_at, "session refreshed");
        self.set(Some(session.clone())).await;
        Ok(session)
    }

    /// Clears the local session. The remote logout is best effort.
    pub async fn sign_out(&self) {
        let previous = self.session.write().await.take();
        self.changes.send_replace(None);
        if let Some(session) = previous {
            if let Err(e) = self.identity.sign_out(&session.access_token).await {
                warn!(error = %e, "remote sign-out failed");
            }
            info!(user = %session.user.id, "signed out");
        }
    }

    pub async fn user(&self) -> SdkResult<User> {
        let token = self.access_token().await?;
        self.identity.get_user(&token).await
    }

    async fn set(&self, session: Option<Session>) {
        *self.session.write().await = session.clone();
        self.changes.send_replace(session);
    }
}

#[async_trait]
impl TokenSource for SessionManager {
    /// Returns the current access token, refreshing it first once it has
    /// expired.
    async fn access_token(&self) -> SdkResult<String> {
        let session = self
            .current()
            .await
            .ok_or_else(|| SdkError::NotAuthenticated("sign in first".to_string()))?;
        if !session.is_expired() {
            return Ok(session.access_token);
        }
        match self.refresh().await {
            Ok(fresh) => Ok(fresh.access_token),
            Err(e) => {
                warn!(error = %e, "session expired and could not be refreshed");
                Err(SdkError::NotAuthenticated("session expired".to_string()))
            }
        }
    }
}
