pub mod args;

use std::path::PathBuf;

use crate::retry::RetryPolicy;
use crate::types::error::PruneError;

/// Default retention window: roughly five years.
pub const DEFAULT_RETENTION_DAYS: u32 = 1825;
/// Default (and maximum) identifiers per batch mutation call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Hard cap on identifiers per batch mutation call (provider API limit).
pub const MAX_BATCH_SIZE: usize = 1000;
/// Default identifiers requested per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;
/// Default cap on pages fetched per run, guarding against a remote service
/// that never stops returning a next cursor.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;
/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MILLISECONDS: u64 = 30_000;

/// Main configuration for the mailprune retention pipeline.
///
/// Holds all settings needed to configure and run a
/// [`RetentionPipeline`](crate::RetentionPipeline): the retention window,
/// batch and page sizing, the dry-run safety switch, retry policy, provider
/// endpoints, and credential locations. Configuration is explicit — it is
/// passed into the pipeline at construction, never read from process-wide
/// state — so multiple pipeline configurations can coexist in one process.
///
/// # Quick Start
///
/// Use [`Config::for_retention`] for a minimal configuration with sensible
/// defaults:
///
/// ```
/// use mailprune::Config;
///
/// let mut config = Config::for_retention(365);
/// config.dry_run = true;
/// assert_eq!(config.batch_size, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Messages strictly older than this many days are eligible.
    pub retention_days: u32,
    /// Identifiers per batch mutation call (1–1000).
    pub batch_size: usize,
    /// Identifiers requested per listing page.
    pub page_size: u32,
    /// Safety cap on listing pages per run.
    pub max_pages: u32,
    /// Simulation mode: list and partition, but never mutate.
    pub dry_run: bool,
    pub retry: RetryPolicy,
    /// Per-call timeout for listing, mutation, and token refresh calls.
    pub request_timeout_milliseconds: u64,
    /// Mailbox API base URL.
    pub api_base_url: String,
    /// OAuth token endpoint used for refresh exchanges.
    pub token_url: String,
    /// Mailbox owner the calls act on.
    pub user_id: String,
    /// Durable credential record location.
    pub token_file: PathBuf,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub tracing_config: Option<TracingConfig>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with production defaults for the given retention
    /// window.
    pub fn for_retention(retention_days: u32) -> Self {
        Config {
            retention_days,
            ..Config::default()
        }
    }

    /// Fail fast on an unusable configuration before any network call.
    pub fn validate(&self) -> Result<(), PruneError> {
        if self.retention_days == 0 {
            return Err(PruneError::ConfigurationInvalid(
                "retention window must be at least 1 day.".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PruneError::ConfigurationInvalid(
                "batch size must be at least 1.".to_string(),
            ));
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(PruneError::ConfigurationInvalid(format!(
                "batch size must be at most {MAX_BATCH_SIZE} (provider API limit)."
            )));
        }
        if self.page_size == 0 {
            return Err(PruneError::ConfigurationInvalid(
                "page size must be at least 1.".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(PruneError::ConfigurationInvalid(
                "max pages must be at least 1.".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(PruneError::ConfigurationInvalid(
                "max attempts must be at least 1.".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            retention_days: DEFAULT_RETENTION_DAYS,
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            dry_run: false,
            retry: RetryPolicy::default(),
            request_timeout_milliseconds: DEFAULT_REQUEST_TIMEOUT_MILLISECONDS,
            api_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            user_id: "me".to_string(),
            token_file: PathBuf::from("token.json"),
            client_id: String::new(),
            client_secret: None,
            tracing_config: None,
            auto_complete_shell: None,
        }
    }
}

/// Tracing (logging) configuration supporting verbosity levels, JSON
/// format, color control, and span events.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub http_client_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
