/*!
# Overview
mailprune is a bulk mailbox retention tool.
It authenticates once, enumerates every remote message older than a cutoff
via cursor-based pagination, and moves those messages to trash in safe,
size-bounded batches.

## Features
- **Batched mutation**: one API call per batch of up to 1000 identifiers,
  so an N-message cleanup costs O(N / batch_size) round trips
- **Dry-run safety gate**: full listing and partitioning with zero mutation
  calls, for safe previews of arbitrarily large result sets
- **Bounded retries**: transient listing and mutation failures are retried
  with exponential backoff; chunk failures are isolated, not fatal
- **Credential lifecycle**: loads, refreshes, and persists the token pair,
  and never silently re-authorizes mid-pipeline
- **Library-First**: the mailprune CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
mailprune = "0.2"
tokio = { version = "1", features = ["full"] }
```

```no_run
use mailprune::{Config, RetentionPipeline, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::for_retention(1825);
    config.client_id = "registered-client-id".to_string();
    config.dry_run = true;

    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = RetentionPipeline::from_config(config, cancellation_token)?;

    let summary = pipeline.run().await?;
    println!(
        "listed {} messages, {} would be trashed",
        summary.listed, summary.would_trash
    );
    Ok(())
}
```
*/

pub mod config;
pub mod credentials;
pub mod enumerator;
pub mod executor;
pub mod mailbox;
pub mod pipeline;
pub mod query;
pub mod retry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::CLIArgs;
pub use pipeline::RetentionPipeline;
pub use types::RunSummary;
pub use types::error::{PruneError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
