//! Auth boundary: sign-in, sign-out and session state against the Supabase
//! auth API (`/auth/v1`).

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error;
use crate::models::{Caller, Session, User};

/// GoTrue user payload. The admin role usually lives in `app_metadata`;
/// the top-level `role` field is the Postgres role and is the fallback.
#[derive(Debug, Deserialize)]
struct RawUser {
    id: Uuid,
    email: Option<String>,
    role: Option<String>,
    #[serde(default)]
    app_metadata: Value,
}

impl RawUser {
    fn into_user(self) -> User {
        let role = self
            .app_metadata
            .get("role")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(self.role);
        User {
            id: self.id,
            email: self.email.unwrap_or_default(),
            role,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: RawUser,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    config: Arc<Config>,
    session: Arc<RwLock<Option<Session>>>,
}

impl AuthClient {
    pub fn new(config: Arc<Config>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            config,
            session: Arc::new(RwLock::new(None)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/auth/v1/{}",
            self.config.supabase_url.trim_end_matches('/'),
            path
        )
    }

    /// Password sign-in. Stores the session on success.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let response = self
            .http
            .post(self.url("token?grant_type=password"))
            .header("apikey", &self.config.supabase_anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("sign-in failed ({status}): {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedRecord(e.to_string()))?;
        let session = Session {
            access_token: token.access_token,
            user: token.user.into_user(),
        };

        *self.session.write().await = Some(session.clone());
        tracing::info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    /// Drop the local session and revoke the token remotely. The local
    /// session is gone even when revocation fails.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            let response = self
                .http
                .post(self.url("logout"))
                .header("apikey", &self.config.supabase_anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await?;
            if !response.status().is_success() {
                tracing::warn!(status = %response.status(), "remote logout failed");
            }
            tracing::info!(user = %session.user.id, "signed out");
        }
        Ok(())
    }

    /// The user behind the current session, re-validated against the
    /// backend. `None` when signed out or when the token is no longer
    /// accepted.
    pub async fn current_user(&self) -> Result<Option<User>, Error> {
        let token = {
            let session = self.session.read().await;
            session.as_ref().map(|s| s.access_token.clone())
        };
        let Some(token) = token else {
            return Ok(None);
        };
        self.fetch_user(&token).await
    }

    /// Rebuild a session from a previously saved access token.
    pub async fn restore(&self, access_token: impl Into<String>) -> Result<Option<User>, Error> {
        let access_token = access_token.into();
        let Some(user) = self.fetch_user(&access_token).await? else {
            return Ok(None);
        };
        *self.session.write().await = Some(Session {
            access_token,
            user: user.clone(),
        });
        Ok(Some(user))
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Identity for repository construction.
    pub async fn caller(&self) -> Caller {
        match self.session.read().await.as_ref() {
            Some(session) => Caller::from_session(session),
            None => Caller::Anonymous,
        }
    }

    async fn fetch_user(&self, token: &str) -> Result<Option<User>, Error> {
        let response = self
            .http
            .get(self.url("user"))
            .header("apikey", &self.config.supabase_anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let raw: RawUser = response
                    .json()
                    .await
                    .map_err(|e| Error::MalformedRecord(e.to_string()))?;
                Ok(Some(raw.into_user()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::BackendUnavailable(format!("HTTP {status}: {body}")))
            }
        }
    }
}
