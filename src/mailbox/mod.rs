//! Remote mailbox service seam.
//!
//! The pipeline depends only on the two call shapes defined here: a
//! cursor-paginated listing and a batched mutation. `HttpMailbox` is the
//! production implementation; tests substitute stubs.

use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::Credential;
use crate::query::QueryExpression;
use crate::types::{Cursor, MessageId, Page};

pub mod http;

pub use http::HttpMailbox;

/// One listing request: filter, position, and page size.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub query: QueryExpression,
    pub cursor: Option<Cursor>,
    pub page_size: u32,
}

/// A message that could not be mutated within an otherwise dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: MessageId,
    pub code: String,
    pub message: String,
}

/// Outcome of one batch mutation call.
///
/// Whether a provider reports per-item failures inside a batch response is
/// provider-dependent; an empty `failed` list on a successful call means the
/// whole batch succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub failed: Vec<ItemFailure>,
}

impl BatchOutcome {
    pub fn is_fully_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Error from a single remote call, classified for the retry layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection-level failure before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// The service asked us to slow down.
    #[error("rate limited by the remote service")]
    RateLimited,

    /// The access token was not accepted.
    #[error("authorization expired: {0}")]
    AuthorizationExpired(String),

    /// Any other HTTP-level rejection.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether a retry with backoff may succeed.
    ///
    /// Network failures, timeouts, throttling, and server-side 5xx are
    /// transient. Authorization and client-side rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout | ApiError::RateLimited => true,
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::AuthorizationExpired(_) | ApiError::Decode(_) => false,
        }
    }
}

/// The two remote operations the pipeline needs.
///
/// `trash_batch` must be idempotent: mutating an already-trashed message is
/// a no-op success, so a failed run can be retried wholesale.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// Fetch one page of message identifiers matching the query.
    async fn list_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> Result<Page, ApiError>;

    /// Move one batch of messages to trash with a single call.
    async fn trash_batch(
        &self,
        credential: &Credential,
        ids: &[MessageId],
    ) -> Result<BatchOutcome, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApiError::Network("connection reset".to_string()).is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::RateLimited.is_transient());
        assert!(
            ApiError::Http {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_transient()
        );

        assert!(
            !ApiError::Http {
                status: 400,
                message: "bad request".to_string()
            }
            .is_transient()
        );
        assert!(!ApiError::AuthorizationExpired("401".to_string()).is_transient());
        assert!(!ApiError::Decode("unexpected body".to_string()).is_transient());
    }

    #[test]
    fn empty_outcome_is_fully_succeeded() {
        assert!(BatchOutcome::default().is_fully_succeeded());

        let partial = BatchOutcome {
            failed: vec![ItemFailure {
                id: MessageId::from("m1"),
                code: "notFound".to_string(),
                message: "message not found".to_string(),
            }],
        };
        assert!(!partial.is_fully_succeeded());
    }
}
