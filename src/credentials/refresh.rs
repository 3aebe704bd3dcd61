//! Refresh-token exchange against the provider's OAuth token endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::ClientRegistration;

/// Token material minted by a successful refresh exchange.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Providers commonly omit this; the caller keeps its stored one.
    pub refresh_token: Option<String>,
    pub expires_in_seconds: Option<u64>,
}

/// Failure modes of a refresh exchange.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The authorization server rejected the refresh token
    /// (revoked/invalid grant). The credential is invalid and must be
    /// re-authorized interactively.
    #[error("refresh rejected: {0}")]
    Rejected(String),

    /// The exchange could not be completed (network, timeout, server
    /// error). The credential's validity is unknown.
    #[error("refresh transport failure: {0}")]
    Transport(String),
}

/// Exchanges a refresh token for fresh token material.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn refresh(
        &self,
        registration: &ClientRegistration,
        refresh_token: &str,
    ) -> Result<RefreshedToken, RefreshError>;
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointErrorBody {
    error: String,
    error_description: Option<String>,
}

/// Standard OAuth2 refresh grant over HTTP (form-encoded POST).
pub struct HttpTokenExchanger {
    client: reqwest::Client,
    token_url: String,
}

impl HttpTokenExchanger {
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build token endpoint HTTP client")?;
        Ok(Self {
            client,
            token_url: token_url.into(),
        })
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn refresh(
        &self,
        registration: &ClientRegistration,
        refresh_token: &str,
    ) -> Result<RefreshedToken, RefreshError> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", registration.client_id.as_str()),
        ];
        if let Some(secret) = &registration.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        debug!(token_url = %self.token_url, "exchanging refresh token.");

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: TokenEndpointResponse = response
                .json()
                .await
                .map_err(|e| RefreshError::Transport(format!("malformed token response: {e}")))?;
            return Ok(RefreshedToken {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
                expires_in_seconds: body.expires_in,
            });
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            // 4xx means the server understood and refused: the grant is dead.
            let reason = match serde_json::from_str::<TokenEndpointErrorBody>(&body) {
                Ok(parsed) => match parsed.error_description {
                    Some(description) => format!("{} ({})", parsed.error, description),
                    None => parsed.error,
                },
                Err(_) => format!("HTTP {status}"),
            };
            warn!(status = %status, reason = %reason, "token endpoint rejected refresh.");
            Err(RefreshError::Rejected(reason))
        } else {
            Err(RefreshError::Transport(format!("HTTP {status}: {body}")))
        }
    }
}
