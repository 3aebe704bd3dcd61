//! Batched mutation of enumerated messages.
//!
//! [`BatchExecutor`] pulls identifiers from a [`MessageSource`], partitions
//! them into consecutive order-preserving chunks of at most the configured
//! batch size, and applies the trash mutation one call per chunk — an N-item
//! run costs O(N / batch_size) round trips, never O(N). Chunks are mutated
//! independently: a chunk-level failure is recorded and the run continues.

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::credentials::Credential;
use crate::enumerator::MessageSource;
use crate::mailbox::{ItemFailure, MailboxClient};
use crate::retry::RetryPolicy;
use crate::types::MessageId;
use crate::types::error::PruneError;
use crate::types::token::PipelineCancellationToken;

/// Bounded number of identifiers echoed per would-mutate batch in dry-run
/// mode. Keeps the preview useful without holding arbitrarily large result
/// sets in the report.
pub const DRY_RUN_SAMPLE_SIZE: usize = 10;

/// How one batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The mutation call succeeded.
    Applied,
    /// Dry run: no call was made. Carries a bounded identifier sample.
    WouldApply { sample: Vec<MessageId> },
    /// The mutation call failed after retries.
    Failed { error: String },
}

/// Outcome record for one dispatched (or simulated) batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub batch_index: usize,
    pub item_count: usize,
    pub outcome: MutationOutcome,
    /// Per-item detail the provider reported inside an otherwise successful
    /// batch response. Optional: most providers report nothing here.
    pub item_failures: Vec<ItemFailure>,
}

impl MutationResult {
    /// Whether the batch's call succeeded (or would have, in dry-run mode).
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, MutationOutcome::Failed { .. })
    }
}

/// Outcome of one executor drain.
///
/// `aborted` carries the listing error that cut the run short, if any.
/// Batches dispatched before the abort are in `results` either way, so the
/// driver can report partial progress before surfacing the error.
pub struct ExecutionOutcome {
    pub results: Vec<MutationResult>,
    pub aborted: Option<anyhow::Error>,
}

/// Applies the trash mutation in bounded batches under the dry-run gate.
pub struct BatchExecutor<'a> {
    client: &'a dyn MailboxClient,
    credential: &'a Credential,
    batch_size: usize,
    dry_run: bool,
    retry: RetryPolicy,
    cancellation_token: PipelineCancellationToken,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(
        client: &'a dyn MailboxClient,
        credential: &'a Credential,
        config: &Config,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            client,
            credential,
            batch_size: config.batch_size,
            dry_run: config.dry_run,
            retry: config.retry,
            cancellation_token,
        }
    }

    /// Drain the source and mutate every identifier in order.
    ///
    /// Produces one [`MutationResult`] per chunk. An error from the source
    /// (listing failure) aborts the drain — identifiers buffered but never
    /// dispatched are left unmutated — while chunk-level mutation failures
    /// are recorded and the drain continues. The cancellation signal is
    /// observed between batches only: on cancellation the results collected
    /// so far are returned and nothing further is dispatched.
    pub async fn run(&self, source: &mut dyn MessageSource) -> ExecutionOutcome {
        let mut results = Vec::new();
        let mut buffer: Vec<MessageId> = Vec::with_capacity(self.batch_size);
        let mut end_of_stream = false;
        let mut aborted = None;

        'drain: while !end_of_stream {
            if self.cancellation_token.is_cancelled() {
                info!(
                    dispatched_batches = results.len(),
                    undispatched = buffer.len(),
                    "mutation cancelled.",
                );
                break;
            }

            while buffer.len() < self.batch_size {
                match source.next().await {
                    Ok(Some(id)) => buffer.push(id),
                    Ok(None) => {
                        end_of_stream = true;
                        break;
                    }
                    Err(e) => {
                        aborted = Some(e);
                        break 'drain;
                    }
                }
            }

            // The source may have drained early because of cancellation;
            // never dispatch after the signal.
            if self.cancellation_token.is_cancelled() {
                info!(
                    dispatched_batches = results.len(),
                    undispatched = buffer.len(),
                    "mutation cancelled.",
                );
                break;
            }

            if !buffer.is_empty() {
                let batch_index = results.len();
                let batch = std::mem::take(&mut buffer);
                results.push(self.dispatch(batch_index, batch).await);
            }
        }

        ExecutionOutcome { results, aborted }
    }

    async fn dispatch(&self, batch_index: usize, ids: Vec<MessageId>) -> MutationResult {
        let item_count = ids.len();

        if self.dry_run {
            let sample: Vec<MessageId> = ids.iter().take(DRY_RUN_SAMPLE_SIZE).cloned().collect();
            info!(
                batch = batch_index,
                items = item_count,
                sample = ?sample.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                "dry run: batch would be moved to trash.",
            );
            return MutationResult {
                batch_index,
                item_count,
                outcome: MutationOutcome::WouldApply { sample },
                item_failures: Vec::new(),
            };
        }

        let mut attempts: u32 = 0;
        loop {
            match self.client.trash_batch(self.credential, &ids).await {
                Ok(outcome) => {
                    if !outcome.failed.is_empty() {
                        warn!(
                            batch = batch_index,
                            failed_items = outcome.failed.len(),
                            "batch applied with per-item failures.",
                        );
                    }
                    debug!(batch = batch_index, items = item_count, "batch moved to trash.");
                    return MutationResult {
                        batch_index,
                        item_count,
                        outcome: MutationOutcome::Applied,
                        item_failures: outcome.failed,
                    };
                }
                Err(e) => {
                    attempts += 1;
                    if e.is_transient() && self.retry.allows_retry(attempts) {
                        let delay = self.retry.delay_for(attempts);
                        warn!(
                            batch = batch_index,
                            attempt = attempts,
                            max_attempts = self.retry.max_attempts,
                            delay_milliseconds = delay.as_millis() as u64,
                            error = %e,
                            "batch mutation failed. retrying.",
                        );
                        sleep(delay).await;
                    } else {
                        let error = PruneError::BatchMutationFailed(format!(
                            "{attempts} attempt(s) exhausted: {e}"
                        ));
                        error!(batch = batch_index, items = item_count, error = %error, "batch failed.");
                        return MutationResult {
                            batch_index,
                            item_count,
                            outcome: MutationOutcome::Failed {
                                error: error.to_string(),
                            },
                            item_failures: Vec::new(),
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{ApiError, BatchOutcome, PageRequest};
    use crate::test_utils::{
        VecSource, init_dummy_tracing_subscriber, make_test_config, make_test_credential,
    };
    use crate::types::Page;
    use crate::types::token::create_pipeline_cancellation_token;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Trash stub recording every dispatched batch.
    ///
    /// `failing_batches` fail every attempt with a transient error;
    /// `already_trashed` identifiers respond as a no-op success.
    #[derive(Default)]
    struct TrashStub {
        trash_calls: AtomicU32,
        batches: Mutex<Vec<Vec<String>>>,
        failing_batches: HashSet<usize>,
        transient_failures_before_success: Mutex<u32>,
        already_trashed: Mutex<HashSet<String>>,
        cancel_on_first_call: Option<PipelineCancellationToken>,
    }

    #[async_trait]
    impl MailboxClient for TrashStub {
        async fn list_page(
            &self,
            _credential: &Credential,
            _request: &PageRequest,
        ) -> Result<Page, ApiError> {
            unimplemented!("mutation-only stub")
        }

        async fn trash_batch(
            &self,
            _credential: &Credential,
            ids: &[MessageId],
        ) -> Result<BatchOutcome, ApiError> {
            self.trash_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(token) = &self.cancel_on_first_call {
                token.cancel();
            }

            {
                let mut remaining = self.transient_failures_before_success.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ApiError::RateLimited);
                }
            }

            let batch_index = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(ids.iter().map(|id| id.as_str().to_string()).collect());
                batches.len() - 1
            };

            if self.failing_batches.contains(&batch_index) {
                return Err(ApiError::Http {
                    status: 400,
                    message: "injected failure".to_string(),
                });
            }

            // Idempotent: identifiers already in the trash are a no-op.
            let mut already_trashed = self.already_trashed.lock().unwrap();
            for id in ids {
                already_trashed.insert(id.as_str().to_string());
            }
            Ok(BatchOutcome::default())
        }
    }

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("m{i}")).collect()
    }

    async fn run_executor(
        stub: &TrashStub,
        config: &Config,
        input: &[String],
        cancellation_token: PipelineCancellationToken,
    ) -> Vec<MutationResult> {
        let credential = make_test_credential();
        let executor = BatchExecutor::new(stub, &credential, config, cancellation_token);
        let mut source = VecSource::new(input.iter().map(|s| s.as_str()));
        let outcome = executor.run(&mut source).await;
        assert!(outcome.aborted.is_none());
        outcome.results
    }

    #[tokio::test]
    async fn partitions_preserve_order_and_bound_size() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub::default();
        let mut config = make_test_config();
        config.batch_size = 3;

        let input = ids(10);
        let results = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;

        // ceil(10/3) = 4 chunks, one call each, all of size 3 except the last.
        assert_eq!(results.len(), 4);
        assert_eq!(stub.trash_calls.load(Ordering::SeqCst), 4);

        let batches = stub.batches.lock().unwrap().clone();
        assert_eq!(
            batches.iter().map(|b| b.len()).collect::<Vec<_>>(),
            vec![3, 3, 3, 1]
        );
        let flattened: Vec<String> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, input);

        assert!(results.iter().all(|r| r.succeeded()));
    }

    #[tokio::test]
    async fn empty_source_dispatches_nothing() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub::default();
        let config = make_test_config();
        let results =
            run_executor(&stub, &config, &[], create_pipeline_cancellation_token()).await;

        assert!(results.is_empty());
        assert_eq!(stub.trash_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dry_run_makes_zero_mutation_calls() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub::default();
        let mut config = make_test_config();
        config.dry_run = true;
        config.batch_size = 25;

        let input = ids(60);
        let results = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;

        assert_eq!(stub.trash_calls.load(Ordering::SeqCst), 0);
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.item_count).sum::<usize>(),
            60,
            "dry run reports the correct total count"
        );

        for result in &results {
            match &result.outcome {
                MutationOutcome::WouldApply { sample } => {
                    assert!(sample.len() <= DRY_RUN_SAMPLE_SIZE);
                    assert!(sample.len() <= result.item_count);
                }
                other => panic!("expected WouldApply, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn dry_run_sample_is_bounded_not_the_full_chunk() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub::default();
        let mut config = make_test_config();
        config.dry_run = true;
        config.batch_size = 1000;

        let input = ids(500);
        let results = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;

        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            MutationOutcome::WouldApply { sample } => {
                assert_eq!(sample.len(), DRY_RUN_SAMPLE_SIZE);
                assert_eq!(sample[0], MessageId::from("m0"));
            }
            other => panic!("expected WouldApply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chunk_failure_is_isolated_from_other_chunks() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub {
            failing_batches: HashSet::from([1]),
            ..TrashStub::default()
        };
        let mut config = make_test_config();
        config.batch_size = 2;

        let input = ids(6);
        let results = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert!(!results[1].succeeded());
        assert!(results[2].succeeded());

        match &results[1].outcome {
            MutationOutcome::Failed { error } => assert!(error.contains("injected failure")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub {
            transient_failures_before_success: Mutex::new(2),
            ..TrashStub::default()
        };
        let config = make_test_config();

        let input = ids(3);
        let results = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].succeeded());
        // Two transient failures plus the successful attempt.
        assert_eq!(stub.trash_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_transient_retries_record_a_failed_batch() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub {
            transient_failures_before_success: Mutex::new(100),
            ..TrashStub::default()
        };
        let config = make_test_config();

        let input = ids(2);
        let results = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].succeeded());
        assert_eq!(
            stub.trash_calls.load(Ordering::SeqCst),
            config.retry.max_attempts
        );
    }

    #[tokio::test]
    async fn rerunning_the_same_mutation_succeeds_both_times() {
        init_dummy_tracing_subscriber();

        let stub = TrashStub::default();
        let config = make_test_config();
        let input = ids(5);

        let first = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;
        assert!(first.iter().all(|r| r.succeeded()));

        // Every identifier is now already trashed; the stub answers the
        // second pass as a no-op success, so the whole run succeeds again.
        let second = run_executor(
            &stub,
            &config,
            &input,
            create_pipeline_cancellation_token(),
        )
        .await;
        assert!(second.iter().all(|r| r.succeeded()));
        assert_eq!(
            stub.already_trashed.lock().unwrap().len(),
            5,
            "no duplicate effect from the second pass"
        );
    }

    #[tokio::test]
    async fn source_error_aborts_but_keeps_dispatched_results() {
        init_dummy_tracing_subscriber();

        /// Source yielding two identifiers then failing.
        struct FailingSource {
            remaining: Vec<MessageId>,
        }

        #[async_trait]
        impl MessageSource for FailingSource {
            async fn next(&mut self) -> anyhow::Result<Option<MessageId>> {
                match self.remaining.pop() {
                    Some(id) => Ok(Some(id)),
                    None => Err(anyhow::anyhow!("listing broke")),
                }
            }
        }

        let stub = TrashStub::default();
        let mut config = make_test_config();
        config.batch_size = 2;
        let credential = make_test_credential();
        let executor = BatchExecutor::new(
            &stub,
            &credential,
            &config,
            create_pipeline_cancellation_token(),
        );

        let mut source = FailingSource {
            remaining: vec![MessageId::from("m1"), MessageId::from("m0")],
        };
        let outcome = executor.run(&mut source).await;

        // The first full batch was dispatched before the source failed.
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].succeeded());
        assert!(outcome.aborted.is_some());
        assert_eq!(stub.trash_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_between_batches_leaves_rest_undispatched() {
        init_dummy_tracing_subscriber();

        let cancellation_token = create_pipeline_cancellation_token();
        let stub = TrashStub {
            cancel_on_first_call: Some(cancellation_token.clone()),
            ..TrashStub::default()
        };
        let mut config = make_test_config();
        config.batch_size = 2;

        let input = ids(6);
        let results = run_executor(&stub, &config, &input, cancellation_token).await;

        // The in-flight batch completes; nothing further is dispatched.
        assert_eq!(results.len(), 1);
        assert!(results[0].succeeded());
        assert_eq!(stub.trash_calls.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // For any input length L and batch size B, partitioning yields
        // ceil(L/B) chunks, order-preserving, all of size B except the last.
        #[test]
        fn partitioning_is_order_preserving_and_size_bounded(
            length in 0usize..200,
            batch_size in 1usize..50,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let stub = TrashStub::default();
                let mut config = make_test_config();
                config.batch_size = batch_size;

                let input = ids(length);
                let results = run_executor(
                    &stub,
                    &config,
                    &input,
                    create_pipeline_cancellation_token(),
                )
                .await;

                let expected_chunks = length.div_ceil(batch_size);
                assert_eq!(results.len(), expected_chunks);

                let batches = stub.batches.lock().unwrap().clone();
                for (i, batch) in batches.iter().enumerate() {
                    if i + 1 < batches.len() {
                        assert_eq!(batch.len(), batch_size);
                    } else {
                        assert!(batch.len() <= batch_size && !batch.is_empty());
                    }
                }
                let flattened: Vec<String> = batches.into_iter().flatten().collect();
                assert_eq!(flattened, input);
            });
        }
    }
}
