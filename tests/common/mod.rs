//! Shared fixtures for the end-to-end pipeline tests.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde_json::{Value, json};

use mailprune::Config;
use mailprune::credentials::{Credential, CredentialStorage, TokenFile};
use mailprune::retry::RetryPolicy;

/// Write a credential record expiring `expires_in_minutes` from now
/// (negative for an already-expired credential) and return its path.
pub fn write_token_file(dir: &Path, expires_in_minutes: i64) -> PathBuf {
    let path = dir.join("token.json");
    let storage = TokenFile::new(&path);
    storage
        .save(&Credential {
            access_token: "stored-access-token".to_string(),
            refresh_token: Some("stored-refresh-token".to_string()),
            expires_at: Some(Utc::now() + Duration::minutes(expires_in_minutes)),
            scopes: vec!["mail.modify".to_string()],
        })
        .unwrap();
    path
}

/// Configuration pointing every endpoint at the mock server, with
/// single-millisecond backoffs so retry paths run fast.
pub fn test_config(server_uri: &str, token_file: PathBuf) -> Config {
    let mut config = Config::for_retention(30);
    config.api_base_url = server_uri.to_string();
    config.token_url = format!("{server_uri}/token");
    config.token_file = token_file;
    config.client_id = "test-client-id".to_string();
    config.client_secret = Some("test-client-secret".to_string());
    config.retry = RetryPolicy {
        max_attempts: 2,
        initial_backoff_milliseconds: 1,
        max_backoff_milliseconds: 2,
    };
    config.request_timeout_milliseconds = 5_000;
    config
}

/// Listing response body in the provider's wire shape.
pub fn list_page_body(ids: &[&str], next_page_token: Option<&str>) -> Value {
    let mut body = json!({
        "messages": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
    });
    if let Some(token) = next_page_token {
        body["nextPageToken"] = json!(token);
    }
    body
}
