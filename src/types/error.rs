use anyhow::Error;
use thiserror::Error;

/// Application-level error types for mailprune.
///
/// These represent errors that occur during credential handling, listing,
/// batch mutation, and configuration validation.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Non-error conditions (Cancelled, DryRun)
/// - 1: General errors (authorization, listing, provider, I/O)
/// - 2: Configuration errors (ConfigurationInvalid)
/// - 3: Partial failure (some batches trashed, some failed)
#[derive(Error, Debug, PartialEq)]
pub enum PruneError {
    /// The user declined consent or the client registration is rejected.
    /// Fatal, never retried.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// No usable stored credential and no way to mint one without user
    /// action. Fatal until the operator re-authorizes.
    #[error("Authorization required: {0}")]
    AuthorizationRequired(String),

    /// A page fetch exhausted its retries. Aborts the run.
    #[error("Listing failed: {0}")]
    ListingFailed(String),

    /// One batch's mutation call failed after retries. Recorded per batch;
    /// the run continues and surfaces the aggregate at the end.
    #[error("Batch mutation failed: {0}")]
    BatchMutationFailed(String),

    /// Invalid configuration (non-retryable, fails before any network call).
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Provider API error outside the listing/mutation retry scope.
    #[error("Provider error: {0}")]
    Provider(String),

    /// I/O error (token file, config file).
    #[error("I/O error: {0}")]
    Io(String),

    /// Operation cancelled by the operator.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Dry-run mode — no mutations performed.
    #[error("Dry-run mode - no mutations performed")]
    DryRun,

    /// Partial failure during batch mutation.
    #[error("Partial failure: {trashed} trashed, {failed} failed")]
    PartialFailure { trashed: u64, failed: u64 },
}

impl PruneError {
    /// Get the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PruneError::Cancelled | PruneError::DryRun => 0,
            PruneError::ConfigurationInvalid(_) => 2,
            PruneError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }

    /// Check if this error is retryable at the pipeline level.
    ///
    /// Transience of individual API calls is classified on
    /// [`ApiError`](crate::mailbox::ApiError); once an error reaches this
    /// taxonomy the retry budget has already been spent.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<PruneError>() {
        return *err == PruneError::Cancelled;
    }
    false
}

/// Check if an anyhow::Error wraps a dry-run error.
pub fn is_dry_run_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<PruneError>() {
        return *err == PruneError::DryRun;
    }
    false
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<PruneError>() {
        return err.exit_code();
    }
    1
}
