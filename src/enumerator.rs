//! Cursor-based message enumeration.
//!
//! [`MessageEnumerator`] walks the provider's paginated listing endpoint as
//! an explicit lazy sequence: identifiers are pulled one at a time, a new
//! page is fetched only when the buffered one is drained, and only the next
//! cursor survives between steps. A new enumeration always starts from page
//! one; there is no resume-from-cursor across runs.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::credentials::Credential;
use crate::mailbox::{MailboxClient, PageRequest};
use crate::query::QueryExpression;
use crate::retry::RetryPolicy;
use crate::types::error::PruneError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{Cursor, MessageId, Page};

/// A pull-based, finite sequence of message identifiers.
///
/// Implemented by [`MessageEnumerator`] for the real listing endpoint and by
/// vector-backed stubs in tests.
#[async_trait]
pub trait MessageSource: Send {
    /// The next identifier, or `None` at the end of the sequence.
    async fn next(&mut self) -> Result<Option<MessageId>>;
}

/// Lazy enumeration of every message matching a retention query.
///
/// The produce-then-advance loop trusts the remote service to eventually
/// return an absent cursor, but also enforces `config.max_pages` so a
/// regressed service cannot loop forever. Transient page-fetch failures are
/// retried with bounded exponential backoff; exhausting the retry budget
/// fails the whole enumeration (identifiers already yielded may already be
/// mutated downstream — the run is not atomic).
pub struct MessageEnumerator<'a> {
    client: &'a dyn MailboxClient,
    credential: &'a Credential,
    query: QueryExpression,
    page_size: u32,
    max_pages: u32,
    retry: RetryPolicy,
    cancellation_token: PipelineCancellationToken,
    cursor: Option<Cursor>,
    buffer: VecDeque<MessageId>,
    pages_fetched: u32,
    listed: u64,
    finished: bool,
}

impl<'a> MessageEnumerator<'a> {
    pub fn new(
        client: &'a dyn MailboxClient,
        credential: &'a Credential,
        query: QueryExpression,
        config: &Config,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            client,
            credential,
            query,
            page_size: config.page_size,
            max_pages: config.max_pages,
            retry: config.retry,
            cancellation_token,
            cursor: None,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            listed: 0,
            finished: false,
        }
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Identifiers yielded into the buffer so far.
    pub fn listed(&self) -> u64 {
        self.listed
    }

    async fn fetch_page_with_retry(&self) -> Result<Page> {
        let request = PageRequest {
            query: self.query.clone(),
            cursor: self.cursor.clone(),
            page_size: self.page_size,
        };

        let mut attempts: u32 = 0;
        loop {
            match self.client.list_page(self.credential, &request).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    attempts += 1;
                    if e.is_transient() && self.retry.allows_retry(attempts) {
                        let delay = self.retry.delay_for(attempts);
                        warn!(
                            attempt = attempts,
                            max_attempts = self.retry.max_attempts,
                            delay_milliseconds = delay.as_millis() as u64,
                            error = %e,
                            "page fetch failed. retrying.",
                        );
                        sleep(delay).await;
                    } else {
                        return Err(PruneError::ListingFailed(format!(
                            "page fetch failed after {attempts} attempt(s): {e}"
                        ))
                        .into());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl MessageSource for MessageEnumerator<'_> {
    async fn next(&mut self) -> Result<Option<MessageId>> {
        loop {
            if let Some(id) = self.buffer.pop_front() {
                return Ok(Some(id));
            }
            if self.finished {
                return Ok(None);
            }
            // Observed only between pages, never mid-request.
            if self.cancellation_token.is_cancelled() {
                info!("listing cancelled.");
                self.finished = true;
                return Ok(None);
            }
            if self.pages_fetched >= self.max_pages {
                return Err(PruneError::ListingFailed(format!(
                    "listing exceeded the {} page cap without an absent cursor.",
                    self.max_pages
                ))
                .into());
            }

            let page = self.fetch_page_with_retry().await?;
            self.pages_fetched += 1;
            self.listed += page.ids.len() as u64;
            debug!(
                page = self.pages_fetched,
                items = page.ids.len(),
                has_next_cursor = page.next_cursor.is_some(),
                "page fetched.",
            );

            self.buffer.extend(page.ids);
            match page.next_cursor {
                Some(cursor) => self.cursor = Some(cursor),
                None => self.finished = true,
            }
        }
    }
}
