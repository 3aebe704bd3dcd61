//! Retention pipeline orchestrator.
//!
//! Wires the credential store, query builder, enumerator, and batch
//! executor into a single run: authenticate → build query → enumerate →
//! mutate. Control flow is strictly linear and pull-based — the executor
//! pulls identifiers from the enumerator, which pulls pages from the remote
//! service — because mutating a mailbox concurrently with enumerating it
//! risks invalidating the pagination cursor.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::credentials::{
    ClientRegistration, CredentialStore, HttpTokenExchanger, TokenFile,
};
use crate::enumerator::MessageEnumerator;
use crate::executor::{BatchExecutor, MutationOutcome, MutationResult};
use crate::mailbox::{HttpMailbox, MailboxClient};
use crate::query::{RetentionPolicy, build_query};
use crate::types::RunSummary;
use crate::types::token::PipelineCancellationToken;

/// The core retention pipeline.
///
/// ## Stages
///
/// ```text
/// CredentialStore → QueryBuilder → MessageEnumerator → BatchExecutor
/// ```
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use mailprune::{Config, RetentionPipeline, create_pipeline_cancellation_token};
///
/// let mut config = Config::for_retention(1825);
/// config.client_id = "registered-client-id".to_string();
/// config.dry_run = true;
///
/// let cancellation_token = create_pipeline_cancellation_token();
/// let mut pipeline = RetentionPipeline::from_config(config, cancellation_token)?;
/// let summary = pipeline.run().await?;
/// assert!(summary.is_full_success());
/// # Ok(())
/// # }
/// ```
pub struct RetentionPipeline {
    config: Config,
    client: Arc<dyn MailboxClient>,
    credential_store: CredentialStore,
    cancellation_token: PipelineCancellationToken,
    ready: bool,
}

impl RetentionPipeline {
    /// Create a pipeline with explicit collaborators.
    ///
    /// Fails fast with `ConfigurationInvalid` before any network call.
    pub fn new(
        config: Config,
        client: Arc<dyn MailboxClient>,
        credential_store: CredentialStore,
        cancellation_token: PipelineCancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            credential_store,
            cancellation_token,
            ready: true,
        })
    }

    /// Create a pipeline wired to the HTTP mailbox client, the token-file
    /// credential storage, and the HTTP token exchanger described by the
    /// configuration.
    pub fn from_config(
        config: Config,
        cancellation_token: PipelineCancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let timeout = Duration::from_millis(config.request_timeout_milliseconds);
        let client = HttpMailbox::new(&config.api_base_url, config.user_id.clone(), timeout)?;

        let registration = ClientRegistration {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        };
        let credential_store = CredentialStore::new(
            registration,
            Box::new(TokenFile::new(config.token_file.clone())),
            Box::new(HttpTokenExchanger::new(config.token_url.clone(), timeout)?),
        );

        Self::new(
            config,
            Arc::new(client),
            credential_store,
            cancellation_token,
        )
    }

    /// Run the pipeline once and report counts by outcome.
    ///
    /// Authorization and listing failures abort the run with an error;
    /// batch-level mutation failures are recorded in the summary and leave
    /// the run to complete. Cancellation stops the run cleanly between
    /// pages/batches; partial progress is reported, not rolled back.
    pub async fn run(&mut self) -> Result<RunSummary> {
        assert!(self.ready, "RetentionPipeline::run() called more than once");
        self.ready = false;

        debug!("retention pipeline start.");

        let credential = self.credential_store.obtain().await?;

        let policy = RetentionPolicy::new(self.config.retention_days);
        let query = build_query(&policy, Utc::now().date_naive());
        info!(query = %query, dry_run = self.config.dry_run, "retention query built.");

        let mut enumerator = MessageEnumerator::new(
            self.client.as_ref(),
            &credential,
            query,
            &self.config,
            self.cancellation_token.clone(),
        );
        let executor = BatchExecutor::new(
            self.client.as_ref(),
            &credential,
            &self.config,
            self.cancellation_token.clone(),
        );

        let outcome = executor.run(&mut enumerator).await;

        // The summary is reported even when listing aborted the run, so the
        // operator sees how far the mutation got before the failure.
        let summary = summarize(
            &outcome.results,
            enumerator.listed(),
            self.cancellation_token.is_cancelled(),
            self.config.dry_run,
        );
        log_summary(&summary);

        if let Some(error) = outcome.aborted {
            return Err(error);
        }
        Ok(summary)
    }
}

fn summarize(
    results: &[MutationResult],
    listed: u64,
    cancelled: bool,
    dry_run: bool,
) -> RunSummary {
    let mut summary = RunSummary {
        listed,
        cancelled,
        dry_run,
        ..RunSummary::default()
    };

    for result in results {
        summary.batches += 1;
        match &result.outcome {
            MutationOutcome::Applied => {
                summary.trashed += (result.item_count - result.item_failures.len()) as u64;
                summary.failed_items += result.item_failures.len() as u64;
            }
            MutationOutcome::WouldApply { .. } => {
                summary.would_trash += result.item_count as u64;
            }
            MutationOutcome::Failed { .. } => {
                summary.failed_batches += 1;
                summary.failed_items += result.item_count as u64;
            }
        }
    }

    summary
}

fn log_summary(summary: &RunSummary) {
    if summary.is_full_success() {
        info!(
            listed = summary.listed,
            trashed = summary.trashed,
            would_trash = summary.would_trash,
            batches = summary.batches,
            cancelled = summary.cancelled,
            dry_run = summary.dry_run,
            "retention run completed.",
        );
    } else {
        warn!(
            listed = summary.listed,
            trashed = summary.trashed,
            failed_batches = summary.failed_batches,
            failed_items = summary.failed_items,
            batches = summary.batches,
            cancelled = summary.cancelled,
            "retention run completed with failures.",
        );
    }
}
