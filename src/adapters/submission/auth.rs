//! OAuth2 client-credentials token management

use crate::config::AuthConfig;
use crate::domain::{Result, SubmissionError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tokens are renewed this many seconds before they expire
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match self.expires_at {
            Some(expiry) if expiry - chrono::Duration::seconds(REFRESH_MARGIN_SECS) <= now => None,
            _ => Some(token),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
}

/// Caches the bearer token shared by all submission workers
#[derive(Clone)]
pub struct TokenManager {
    client: Client,
    config: AuthConfig,
    state: Arc<Mutex<TokenState>>,
}

impl TokenManager {
    pub fn new(client: Client, config: AuthConfig) -> Self {
        Self {
            client,
            config,
            state: Arc::new(Mutex::new(TokenState::default())),
        }
    }

    /// Returns a valid access token, requesting a new one when needed
    ///
    /// The lock is held across the token request so concurrent workers
    /// wait for one refresh instead of each issuing their own.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.valid_token(Utc::now()) {
            return Ok(token.to_string());
        }

        let response = self.request_token().await?;
        let expires_at = response
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        tracing::info!(
            token_url = %self.config.token_url,
            expires_at = ?expires_at,
            "Acquired submission access token"
        );

        state.access_token = Some(response.access_token.clone());
        state.expires_at = expires_at;
        Ok(response.access_token)
    }

    /// Drops the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.access_token = None;
        state.expires_at = None;
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        let credentials = format!(
            "{}:{}",
            self.config.client_id,
            self.config.client_secret.expose_secret().as_str()
        );

        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = &self.config.scope {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .header("Authorization", format!("Basic {}", STANDARD.encode(credentials)))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                SubmissionError::AuthenticationFailed(format!("Failed to request token: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::AuthenticationFailed(format!(
                "Token request failed with status {status}: {body}"
            ))
            .into());
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            SubmissionError::AuthenticationFailed(format!("Failed to parse token response: {e}"))
                .into()
        })
    }
}
