//! Credential lifecycle for the retention pipeline.
//!
//! The [`CredentialStore`] owns the token pair for the process lifetime:
//! it loads a previously persisted credential, refreshes it when expired,
//! and persists every piece of new token material before returning control,
//! so a process restart never needs more than one resumed refresh.
//!
//! State transitions: `Absent → Loaded → {Valid, Expired} → Refreshed →
//! Valid`. A refresh rejected by the authorization server makes the
//! credential `Invalid`, which is terminal: the store fails with
//! `AuthorizationRequired` instead of silently re-running the interactive
//! consent exchange mid-pipeline.

use std::fmt;
use std::fmt::{Debug, Formatter};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::error::PruneError;

pub mod refresh;
pub mod storage;

pub use refresh::{HttpTokenExchanger, RefreshError, RefreshedToken, TokenExchanger};
pub use storage::{CredentialStorage, MemoryStorage, TokenFile};

/// Slack applied before the recorded expiry; a credential this close to
/// expiring is treated as expired to absorb clock skew between the local
/// clock and the authorization server.
const EXPIRY_SLACK_SECONDS: i64 = 60;

/// OAuth client registration data, provisioned out of band.
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Access/refresh token pair with grant metadata.
///
/// Secret fields are cleared from memory on drop and redacted from `Debug`
/// output. Callers receive value snapshots sufficient to authorize one call
/// set; the store retains ownership of the durable record.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[zeroize(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    #[zeroize(skip)]
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let refresh_token = self
            .refresh_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        f.debug_struct("Credential")
            .field("access_token", &"** redacted **")
            .field("refresh_token", &refresh_token)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl Credential {
    /// Whether the credential is expired (or within the skew slack of
    /// expiring) at `now`. A credential without a recorded expiry counts as
    /// valid; the provider rejects it on use if it is not.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now <= Duration::seconds(EXPIRY_SLACK_SECONDS),
            None => false,
        }
    }
}

/// Interactive consent exchange collaborator.
///
/// Invoked only when no credential is stored at all. Given client
/// registration data it returns a valid [`Credential`] or fails with
/// [`PruneError::AuthorizationDenied`]. The consent-screen UX itself is
/// outside this crate.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, registration: &ClientRegistration) -> Result<Credential>;
}

/// Loads, validates, refreshes, and persists the credential for one
/// pipeline run.
pub struct CredentialStore {
    registration: ClientRegistration,
    storage: Box<dyn CredentialStorage>,
    exchanger: Box<dyn TokenExchanger>,
    flow: Option<Box<dyn AuthorizationFlow>>,
}

impl CredentialStore {
    pub fn new(
        registration: ClientRegistration,
        storage: Box<dyn CredentialStorage>,
        exchanger: Box<dyn TokenExchanger>,
    ) -> Self {
        Self {
            registration,
            storage,
            exchanger,
            flow: None,
        }
    }

    /// Attach an interactive authorization flow, used only when no
    /// credential is stored.
    pub fn with_authorization_flow(mut self, flow: Box<dyn AuthorizationFlow>) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Produce a credential valid to authorize the run's call set.
    ///
    /// Every transition that mints new token material persists it before
    /// this method returns.
    pub async fn obtain(&self) -> Result<Credential> {
        let loaded = self.storage.load().context("credential load failed.")?;

        let Some(credential) = loaded else {
            return self.authorize_interactively().await;
        };

        if !credential.is_expired(Utc::now()) {
            debug!("stored credential is valid.");
            return Ok(credential);
        }

        let Some(refresh_token) = credential.refresh_token.clone() else {
            return Err(PruneError::AuthorizationRequired(
                "stored credential is expired and has no refresh token.".to_string(),
            )
            .into());
        };

        debug!("stored credential is expired. refreshing.");
        match self
            .exchanger
            .refresh(&self.registration, &refresh_token)
            .await
        {
            Ok(refreshed) => {
                let credential = Credential {
                    access_token: refreshed.access_token.clone(),
                    // Providers commonly omit the refresh token on refresh
                    // responses; keep the one we already hold.
                    refresh_token: refreshed
                        .refresh_token
                        .clone()
                        .or(Some(refresh_token.clone())),
                    expires_at: refreshed
                        .expires_in_seconds
                        .map(|seconds| Utc::now() + Duration::seconds(seconds as i64)),
                    scopes: credential.scopes.clone(),
                };
                self.persist(&credential)?;
                info!("credential refreshed and persisted.");
                Ok(credential)
            }
            Err(RefreshError::Rejected(reason)) => {
                warn!(reason = %reason, "refresh token rejected. credential is invalid.");
                self.storage
                    .clear()
                    .context("invalid credential cleanup failed.")?;
                Err(PruneError::AuthorizationRequired(format!(
                    "refresh token rejected ({reason}). re-run authorization."
                ))
                .into())
            }
            Err(RefreshError::Transport(message)) => Err(PruneError::Provider(format!(
                "token refresh transport failure: {message}"
            ))
            .into()),
        }
    }

    /// Persist the credential through the durable storage collaborator.
    pub fn persist(&self, credential: &Credential) -> Result<()> {
        self.storage
            .save(credential)
            .context("credential persist failed.")
    }

    async fn authorize_interactively(&self) -> Result<Credential> {
        let Some(flow) = &self.flow else {
            return Err(PruneError::AuthorizationRequired(
                "no stored credential and no interactive authorization flow configured."
                    .to_string(),
            )
            .into());
        };

        info!("no stored credential. starting interactive authorization.");
        let credential = flow.authorize(&self.registration).await?;
        self.persist(&credential)?;
        Ok(credential)
    }
}
