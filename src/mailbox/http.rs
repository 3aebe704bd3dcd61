//! HTTP implementation of the mailbox service seam.
//!
//! Speaks the provider's REST shape: a message listing endpoint with
//! `q`/`pageToken`/`maxResults` parameters and a `batchModify` endpoint that
//! applies the trash label to up to a batch of identifiers per call.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::credentials::Credential;
use crate::types::{Cursor, MessageId, Page};

use super::{ApiError, BatchOutcome, ItemFailure, MailboxClient, PageRequest};

/// Label applied by the trash mutation.
const TRASH_LABEL: &str = "TRASH";

/// REST mailbox client.
pub struct HttpMailbox {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl HttpMailbox {
    /// Create a client for `base_url` (e.g. `https://mail.example.com/v1`)
    /// acting as `user_id`. `timeout` applies per call.
    pub fn new(base_url: &str, user_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("invalid mailbox API base URL: {base_url}"))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build mailbox HTTP client")?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, self.user_id)
    }

    fn batch_modify_url(&self) -> String {
        format!("{}/batchModify", self.messages_url())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Serialize)]
struct BatchModifyRequest<'a> {
    ids: Vec<&'a str>,
    #[serde(rename = "addLabelIds")]
    add_label_ids: Vec<&'a str>,
    #[serde(rename = "removeLabelIds")]
    remove_label_ids: Vec<&'a str>,
}

/// Optional per-item detail some providers return on a successful batch
/// call. An empty or absent body means the whole batch succeeded.
#[derive(Debug, Default, Deserialize)]
struct BatchModifyResponse {
    #[serde(default)]
    failed: Vec<FailedEntry>,
}

#[derive(Debug, Deserialize)]
struct FailedEntry {
    id: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_send_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Extract the provider's error message and status tag from an error body.
fn extract_error_details(status: reqwest::StatusCode, body: &str) -> (String, String) {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(detail),
        }) => (
            detail.status.unwrap_or_else(|| "unknown".to_string()),
            detail.message.unwrap_or_else(|| "no message".to_string()),
        ),
        _ => ("unknown".to_string(), format!("HTTP {status}")),
    }
}

fn map_status_error(status: reqwest::StatusCode, body: &str) -> ApiError {
    let (error_status, message) = extract_error_details(status, body);
    match status.as_u16() {
        401 => ApiError::AuthorizationExpired(message),
        429 => ApiError::RateLimited,
        code => ApiError::Http {
            status: code,
            message: format!("{message} ({error_status})"),
        },
    }
}

/// Whether a rejected mutation means the messages are already in the target
/// state. Re-applying the trash label to an already-trashed message must be
/// a no-op success so a failed run can be retried wholesale.
fn is_already_in_target_state(status: reqwest::StatusCode, body: &str) -> bool {
    if status.as_u16() != 409 {
        return false;
    }
    let (error_status, message) = extract_error_details(status, body);
    error_status == "ALREADY_IN_REQUESTED_STATE"
        || message.to_ascii_lowercase().contains("already")
}

#[async_trait]
impl MailboxClient for HttpMailbox {
    async fn list_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> Result<Page, ApiError> {
        let mut query_params: Vec<(&str, String)> = vec![
            ("q", request.query.as_str().to_string()),
            ("maxResults", request.page_size.to_string()),
        ];
        if let Some(cursor) = &request.cursor {
            query_params.push(("pageToken", cursor.as_str().to_string()));
        }

        let response = self
            .client
            .get(self.messages_url())
            .bearer_auth(&credential.access_token)
            .query(&query_params)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mapped = map_status_error(status, &body);
            error!(
                status = status.as_u16(),
                error = %mapped,
                "message listing call failed.",
            );
            return Err(mapped);
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let page = Page {
            ids: body
                .messages
                .into_iter()
                .map(|m| MessageId::from(m.id))
                .collect(),
            next_cursor: body.next_page_token.map(Cursor::new),
        };
        debug!(
            items = page.ids.len(),
            has_next_cursor = page.next_cursor.is_some(),
            "message listing page fetched.",
        );
        Ok(page)
    }

    async fn trash_batch(
        &self,
        credential: &Credential,
        ids: &[MessageId],
    ) -> Result<BatchOutcome, ApiError> {
        let request_body = BatchModifyRequest {
            ids: ids.iter().map(|id| id.as_str()).collect(),
            add_label_ids: vec![TRASH_LABEL],
            remove_label_ids: vec![],
        };

        let response = self
            .client
            .post(self.batch_modify_url())
            .bearer_auth(&credential.access_token)
            .json(&request_body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_already_in_target_state(status, &body) {
                debug!(
                    batch_size = ids.len(),
                    "batch already in target state. treating as success.",
                );
                return Ok(BatchOutcome::default());
            }
            let mapped = map_status_error(status, &body);
            error!(
                status = status.as_u16(),
                batch_size = ids.len(),
                error = %mapped,
                "batch mutation call failed.",
            );
            return Err(mapped);
        }

        // Per-item failure detail is optional: an empty body is a wholly
        // successful batch.
        let body = response.text().await.unwrap_or_default();
        let outcome = if body.trim().is_empty() {
            BatchOutcome::default()
        } else {
            let parsed: BatchModifyResponse =
                serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
            BatchOutcome {
                failed: parsed
                    .failed
                    .into_iter()
                    .map(|entry| ItemFailure {
                        id: MessageId::from(entry.id),
                        code: entry.code,
                        message: entry.message,
                    })
                    .collect(),
            }
        };

        debug!(
            batch_size = ids.len(),
            failed = outcome.failed.len(),
            "batch mutation call completed.",
        );
        Ok(outcome)
    }
}
