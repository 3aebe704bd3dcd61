//! Shared test utilities for the mailprune library crate.
//!
//! This module provides canonical helper functions used across multiple test
//! modules, eliminating duplication and ensuring consistency.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::credentials::Credential;
use crate::enumerator::MessageSource;
use crate::retry::RetryPolicy;
use crate::types::MessageId;

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit / property tests.
///
/// Backoffs are shrunk to single milliseconds so retry paths run fast.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_retention(30);
    config.client_id = "test-client-id".to_string();
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff_milliseconds: 1,
        max_backoff_milliseconds: 4,
    };
    config
}

/// Create a credential sufficient to authorize stubbed calls.
pub(crate) fn make_test_credential() -> Credential {
    Credential {
        access_token: "access-token".to_string(),
        refresh_token: None,
        expires_at: None,
        scopes: vec![],
    }
}

/// Vector-backed [`MessageSource`] for executor tests.
pub(crate) struct VecSource {
    ids: VecDeque<MessageId>,
}

impl VecSource {
    pub(crate) fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MessageId>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl MessageSource for VecSource {
    async fn next(&mut self) -> Result<Option<MessageId>> {
        Ok(self.ids.pop_front())
    }
}
