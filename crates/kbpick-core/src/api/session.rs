//! Authenticated session against the identity provider.
//!
//! The bearer token is acquired once per session. Every backend call goes
//! through [`Session::authorize`], which initializes the session on first use.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::{AuthConfig, Config, Credentials, AUTH_TIMEOUT_SECS};
use crate::errors::{KbError, KbResult};

/// Token endpoint, relative to the identity provider base URL.
pub const AUTH_TOKEN_PATH: &str = "/auth/v1/token?grant_type=password";

#[derive(Debug, Serialize)]
struct AuthRequestBody<'a> {
    email: &'a str,
    password: &'a str,
    gotrue_meta_security: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
}

/// One-time-initialized bearer token.
#[derive(Debug)]
pub struct Session {
    client: reqwest::Client,
    auth: AuthConfig,
    credentials: Credentials,
    token: OnceCell<String>,
}

impl Session {
    /// Create an uninitialized session.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::MissingCredentials`] if email or password is unset.
    /// No network call is made.
    pub fn new(client: reqwest::Client, config: &Config) -> KbResult<Self> {
        Ok(Self {
            client,
            auth: config.auth.clone(),
            credentials: config.credentials()?,
            token: OnceCell::new(),
        })
    }

    /// Whether a token has been acquired.
    pub fn is_initialized(&self) -> bool {
        self.token.initialized()
    }

    /// Acquire the token if needed.
    ///
    /// Concurrent callers wait for the same request; after success every
    /// call returns immediately. A failed attempt leaves the session
    /// uninitialized so the next call retries.
    pub async fn ensure_initialized(&self) -> KbResult<&str> {
        let token = self
            .token
            .get_or_try_init(|| async { self.request_token().await })
            .await?;
        Ok(token.as_str())
    }

    /// Attach the bearer token to a request, initializing the session first.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> KbResult<reqwest::RequestBuilder> {
        let token = self.ensure_initialized().await?;
        Ok(request.bearer_auth(token))
    }

    async fn request_token(&self) -> KbResult<String> {
        let url = format!("{}{}", self.auth.url.trim_end_matches('/'), AUTH_TOKEN_PATH);
        tracing::debug!("Requesting access token for {}", self.credentials.email);

        let body = AuthRequestBody {
            email: &self.credentials.email,
            password: &self.credentials.password,
            gotrue_meta_security: serde_json::Map::new(),
        };

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
            .header("Apikey", &self.auth.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Identity provider unreachable: {}", e);
                KbError::AuthUnreachable {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!("Authentication failed with status {}", status);
            return Err(KbError::AuthenticationFailed {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AuthResponse =
            response
                .json()
                .await
                .map_err(|e| KbError::AuthenticationFailed {
                    status: status.as_u16(),
                    message: format!("unreadable token response: {}", e),
                })?;

        tracing::info!("Authentication successful");
        Ok(parsed.access_token)
    }
}
