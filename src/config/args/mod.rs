use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use crate::config::{Config, TracingConfig};
use crate::retry::RetryPolicy;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_RETENTION_DAYS: u32 = crate::config::DEFAULT_RETENTION_DAYS;
const DEFAULT_BATCH_SIZE: usize = crate::config::DEFAULT_BATCH_SIZE;
const DEFAULT_PAGE_SIZE: u32 = crate::config::DEFAULT_PAGE_SIZE;
const DEFAULT_MAX_PAGES: u32 = crate::config::DEFAULT_MAX_PAGES;
const DEFAULT_REQUEST_TIMEOUT_MILLISECONDS: u64 =
    crate::config::DEFAULT_REQUEST_TIMEOUT_MILLISECONDS;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MILLISECONDS: u64 = 32_000;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_USER_ID: &str = "me";
const DEFAULT_TOKEN_FILE: &str = "token.json";
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_CLIENT_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_CLIENT_ID_MISSING: &str =
    "Client ID is required. Pass --client-id or set MAILPRUNE_CLIENT_ID.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// mailprune - Bulk mailbox retention tool.
///
/// Moves every message older than the retention window to trash in
/// size-bounded batches.
///
/// Example:
///   mailprune --older-than-days 1825 --dry-run
///   mailprune --older-than-days 365 --batch-size 500
#[derive(Parser, Clone, Debug)]
#[command(name = "mailprune", version, about, long_about = None)]
pub struct CLIArgs {
    // -----------------------------------------------------------------------
    // Retention options
    // -----------------------------------------------------------------------
    /// Move messages strictly older than this many days to trash.
    #[arg(short = 'o', long, env = "MAILPRUNE_OLDER_THAN_DAYS",
        default_value_t = DEFAULT_RETENTION_DAYS, help_heading = "Retention")]
    pub older_than_days: u32,

    /// Simulation mode. Lists and partitions messages but does not mutate.
    #[arg(short = 'd', long, env = "MAILPRUNE_DRY_RUN",
        default_value_t = DEFAULT_DRY_RUN, help_heading = "Retention")]
    pub dry_run: bool,

    /// Number of message IDs per batch mutation request (1–1000).
    #[arg(long, env = "MAILPRUNE_BATCH_SIZE",
        default_value_t = DEFAULT_BATCH_SIZE, help_heading = "Retention")]
    pub batch_size: usize,

    /// Number of message IDs requested per listing page.
    #[arg(long, env = "MAILPRUNE_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE, help_heading = "Retention")]
    pub page_size: u32,

    /// Abort the listing after this many pages (runaway-cursor guard).
    #[arg(long, env = "MAILPRUNE_MAX_PAGES",
        default_value_t = DEFAULT_MAX_PAGES, help_heading = "Retention")]
    pub max_pages: u32,

    // -----------------------------------------------------------------------
    // Provider options
    // -----------------------------------------------------------------------
    /// Mailbox API base URL.
    #[arg(long, env = "MAILPRUNE_API_BASE_URL",
        value_parser = NonEmptyStringValueParser::new(),
        default_value = DEFAULT_API_BASE_URL, help_heading = "Provider")]
    pub api_base_url: String,

    /// OAuth token endpoint URL used for refresh exchanges.
    #[arg(long, env = "MAILPRUNE_TOKEN_URL",
        value_parser = NonEmptyStringValueParser::new(),
        default_value = DEFAULT_TOKEN_URL, help_heading = "Provider")]
    pub token_url: String,

    /// Mailbox owner the calls act on.
    #[arg(long, env = "MAILPRUNE_USER_ID",
        value_parser = NonEmptyStringValueParser::new(),
        default_value = DEFAULT_USER_ID, help_heading = "Provider")]
    pub user_id: String,

    // -----------------------------------------------------------------------
    // Credential options
    // -----------------------------------------------------------------------
    /// OAuth client ID of the registered application.
    #[arg(long, env = "MAILPRUNE_CLIENT_ID",
        value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub client_id: Option<String>,

    /// OAuth client secret (omit for public clients).
    #[arg(long, env = "MAILPRUNE_CLIENT_SECRET",
        value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub client_secret: Option<String>,

    /// Path of the persisted token file.
    #[arg(long, env = "MAILPRUNE_TOKEN_FILE",
        default_value = DEFAULT_TOKEN_FILE, help_heading = "Credentials")]
    pub token_file: PathBuf,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Maximum attempts per remote call (including the first).
    #[arg(long, env = "MAILPRUNE_MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS, help_heading = "Retry")]
    pub max_attempts: u32,

    /// Initial backoff in milliseconds between retries.
    #[arg(long, env = "MAILPRUNE_INITIAL_BACKOFF_MILLISECONDS",
        default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    /// Maximum backoff in milliseconds between retries.
    #[arg(long, env = "MAILPRUNE_MAX_BACKOFF_MILLISECONDS",
        default_value_t = DEFAULT_MAX_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub max_backoff_milliseconds: u64,

    /// Per-call timeout in milliseconds.
    #[arg(long, env = "MAILPRUNE_REQUEST_TIMEOUT_MILLISECONDS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MILLISECONDS, help_heading = "Retry")]
    pub request_timeout_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env = "MAILPRUNE_JSON_TRACING",
        default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable HTTP client tracing.
    #[arg(long, env = "MAILPRUNE_HTTP_CLIENT_TRACING",
        default_value_t = DEFAULT_HTTP_CLIENT_TRACING, help_heading = "Logging")]
    pub http_client_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env = "MAILPRUNE_SPAN_EVENTS_TRACING",
        default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env = "MAILPRUNE_DISABLE_COLOR_TRACING",
        default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Generate shell completions.
    #[arg(long, env = "MAILPRUNE_AUTO_COMPLETE_SHELL", help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use mailprune::config::args::parse_from_args;
///
/// let args = vec!["mailprune", "--older-than-days", "365", "--dry-run"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dry_run);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Config conversion
// ---------------------------------------------------------------------------

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        let generating_completions = args.auto_complete_shell.is_some();

        let client_id = match args.client_id {
            Some(client_id) => client_id,
            // Completion generation exits before any credential use.
            None if generating_completions => String::new(),
            None => return Err(ERROR_MESSAGE_CLIENT_ID_MISSING.to_string()),
        };

        let tracing_config = args.verbosity.log_level().map(|level| TracingConfig {
            tracing_level: level,
            json_tracing: args.json_tracing,
            http_client_tracing: args.http_client_tracing,
            span_events_tracing: args.span_events_tracing,
            disable_color_tracing: args.disable_color_tracing,
        });

        let config = Config {
            retention_days: args.older_than_days,
            batch_size: args.batch_size,
            page_size: args.page_size,
            max_pages: args.max_pages,
            dry_run: args.dry_run,
            retry: RetryPolicy {
                max_attempts: args.max_attempts,
                initial_backoff_milliseconds: args.initial_backoff_milliseconds,
                max_backoff_milliseconds: args.max_backoff_milliseconds,
            },
            request_timeout_milliseconds: args.request_timeout_milliseconds,
            api_base_url: args.api_base_url,
            token_url: args.token_url,
            user_id: args.user_id,
            token_file: args.token_file,
            client_id,
            client_secret: args.client_secret,
            tracing_config,
            auto_complete_shell: args.auto_complete_shell,
        };

        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}
