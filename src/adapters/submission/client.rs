//! HTTP submission client

use super::auth::TokenManager;
use super::{SubmissionResponse, Submitter, FHIR_XML};
use crate::config::{RetryConfig, SubmissionConfig};
use crate::domain::{BridgeError, Result, SubmissionError};
use crate::log_retry_attempt;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;

/// Posts bundles to the transaction endpoint of the submission API
pub struct HttpSubmitter {
    client: Client,
    endpoint: String,
    retry: RetryConfig,
    tokens: Option<TokenManager>,
}

impl HttpSubmitter {
    /// Builds the HTTP client and, when credentials are configured, the
    /// token manager
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed
    pub fn new(config: &SubmissionConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled for the submission API"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            BridgeError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        let tokens = config
            .auth
            .clone()
            .map(|auth| TokenManager::new(client.clone(), auth));

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            retry: config.retry.clone(),
            tokens,
        })
    }

    /// Transaction endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, xml: &str) -> std::result::Result<(u16, String), SubmissionError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", FHIR_XML)
            .header("Accept", FHIR_XML)
            .body(xml.to_string());

        if let Some(tokens) = &self.tokens {
            let token = tokens.bearer_token().await.map_err(|e| match e {
                BridgeError::Submission(inner) => inner,
                other => SubmissionError::AuthenticationFailed(other.to_string()),
            })?;
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SubmissionError::Timeout(e.to_string())
            } else {
                SubmissionError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;

        if status.is_success() {
            Ok((status.as_u16(), body))
        } else {
            Err(SubmissionError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Delay before retry number `attempt` (1-based)
pub fn backoff_delay(retry: &RetryConfig, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let delay = retry.initial_delay_ms as f64 * retry.backoff_multiplier.powi(exponent);
    let delay_ms = if delay.is_finite() {
        (delay as u64).min(retry.max_delay_ms)
    } else {
        retry.max_delay_ms
    };
    Duration::from_millis(delay_ms)
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, xml: String) -> Result<SubmissionResponse> {
        let max_attempts = self.retry.max_retries + 1;
        let mut attempt = 0;
        let mut refreshed_token = false;

        loop {
            attempt += 1;
            match self.attempt(&xml).await {
                Ok((status, body)) => {
                    tracing::info!(
                        endpoint = %self.endpoint,
                        status,
                        attempts = attempt,
                        "Bundle accepted"
                    );
                    return Ok(SubmissionResponse {
                        status,
                        body,
                        attempts: attempt,
                    });
                }
                Err(SubmissionError::Rejected { status, .. })
                    if status == StatusCode::UNAUTHORIZED.as_u16()
                        && !refreshed_token
                        && self.tokens.is_some() =>
                {
                    // the cached token was revoked early; one fresh token, no backoff
                    refreshed_token = true;
                    if let Some(tokens) = &self.tokens {
                        tokens.invalidate().await;
                    }
                    attempt -= 1;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    log_retry_attempt!(attempt, max_attempts, e);
                    tokio::time::sleep(backoff_delay(&self.retry, attempt)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{secret_string, AuthConfig};

    fn config(base_url: String) -> SubmissionConfig {
        SubmissionConfig {
            base_url,
            bundle_path: "/bundle".to_string(),
            timeout_seconds: 5,
            tls_verify: true,
            retry: RetryConfig {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 5,
                backoff_multiplier: 2.0,
            },
            auth: None,
        }
    }

    #[test]
    fn test_backoff_delay() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(backoff_delay(&retry, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&retry, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(&retry, 3), Duration::from_millis(400));
        assert_eq!(backoff_delay(&retry, 10), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_submit_posts_fhir_xml() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bundle")
            .match_header("content-type", FHIR_XML)
            .match_body("<Bundle/>")
            .with_status(200)
            .with_body("<Bundle><type value=\"transaction-response\"/></Bundle>")
            .create_async()
            .await;

        let submitter = HttpSubmitter::new(&config(server.url())).unwrap();
        let response = submitter.submit("<Bundle/>".to_string()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.attempts, 1);
        assert!(response.body.contains("transaction-response"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bundle")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let submitter = HttpSubmitter::new(&config(server.url())).unwrap();
        let err = submitter.submit("<Bundle/>".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Submission(SubmissionError::Rejected { status: 503, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bundle")
            .with_status(422)
            .with_body("<OperationOutcome/>")
            .expect(1)
            .create_async()
            .await;

        let submitter = HttpSubmitter::new(&config(server.url())).unwrap();
        let err = submitter.submit("<Bundle/>".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("OperationOutcome"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-9","expires_in":3600}"#)
            .create_async()
            .await;
        let bundle = server
            .mock("POST", "/bundle")
            .match_header("authorization", "Bearer tok-9")
            .with_status(201)
            .create_async()
            .await;

        let mut config = config(server.url());
        config.auth = Some(AuthConfig {
            token_url: format!("{}/token", server.url()),
            client_id: "bridge".to_string(),
            client_secret: secret_string("s3cr3t".to_string()),
            scope: None,
        });

        let submitter = HttpSubmitter::new(&config).unwrap();
        let response = submitter.submit("<Bundle/>".to_string()).await.unwrap();
        assert_eq!(response.status, 201);
        bundle.assert_async().await;
    }
}
