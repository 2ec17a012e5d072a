//! Email/password auth against a GoTrue-compatible REST endpoint.

use std::env;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tutor_core::model::UserId;

use crate::error::AuthError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub base_url: String,
    pub anon_key: String,
}

impl AuthConfig {
    /// Reads `TUTOR_AUTH_URL` and `TUTOR_AUTH_ANON_KEY`; `None` when either is unset.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("TUTOR_AUTH_URL").ok()?;
        let anon_key = env::var("TUTOR_AUTH_ANON_KEY").ok()?;
        if base_url.trim().is_empty() || anon_key.trim().is_empty() {
            return None;
        }
        Some(Self { base_url, anon_key })
    }
}

/// An authenticated user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: UserId,
    pub email: String,
    pub access_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The provider sent a confirmation email; no session yet.
    ConfirmationRequired { email: String },
    SignedIn(AuthSession),
}

#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    config: Option<AuthConfig>,
}

impl AuthClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AuthConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AuthConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// # Errors
    ///
    /// Returns `AuthError` when auth is disabled, the credentials are rejected,
    /// or the request fails.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body: SessionBody = self
            .post(
                "token?grant_type=password",
                &Credentials { email, password },
            )
            .await
            .inspect_err(|err| warn!(error = %err, "sign in failed"))?;
        let session = body.into_session()?;
        info!(user = %session.user_id, "signed in");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AuthError` when auth is disabled, the provider rejects the
    /// sign-up, or the request fails.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let body: SessionBody = self.post("signup", &Credentials { email, password }).await?;
        if body.access_token.is_some() {
            return Ok(SignUpOutcome::SignedIn(body.into_session()?));
        }
        info!("sign up awaiting email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired {
            email: email.to_string(),
        })
    }

    /// Exchange the token hash from a confirmation link for a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when the link is invalid or expired, or the request fails.
    pub async fn confirm_email(&self, token_hash: &str) -> Result<AuthSession, AuthError> {
        let body: SessionBody = self
            .post(
                "verify",
                &Verify {
                    token_hash,
                    kind: "signup",
                },
            )
            .await?;
        body.into_session()
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AuthError> {
        let config = self.config.as_ref().ok_or(AuthError::Disabled)?;
        let url = format!("{}/auth/v1/{path}", config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .header("apikey", &config.anon_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let reason = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(ErrorBody::message)
                .unwrap_or_else(|| status.to_string());
            return Err(AuthError::Rejected(reason));
        }
        Err(AuthError::HttpStatus(status))
    }
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct Verify<'a> {
    token_hash: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: Option<String>,
    user: Option<UserBody>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    email: Option<String>,
}

impl SessionBody {
    fn into_session(self) -> Result<AuthSession, AuthError> {
        let access_token = self.access_token.ok_or(AuthError::MissingSession)?;
        let user = self.user.ok_or(AuthError::MissingSession)?;
        let user_id = user
            .id
            .parse::<UserId>()
            .map_err(|_| AuthError::MissingSession)?;
        Ok(AuthSession {
            user_id,
            email: user.email.unwrap_or_default(),
            access_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}
