use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error};

use mailprune::types::RunSummary;
use mailprune::{
    CLIArgs, Config, PruneError, RetentionPipeline, create_pipeline_cancellation_token,
    exit_code_from_error, is_cancelled_error,
};

mod ctrl_c_handler;
mod tracing_init;

/// mailprune - Bulk mailbox retention tool.
///
/// This binary is a thin wrapper over the mailprune library.
/// All core functionality is implemented in the library crate.
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "mailprune",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    run(config).await
}

fn load_config_exit_if_err() -> Config {
    let config = Config::try_from(CLIArgs::parse());
    if let Err(error_message) = config {
        clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit();
    }
    config.unwrap()
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    if config.tracing_config.is_none() {
        return false;
    }

    tracing_init::init_tracing(config.tracing_config.as_ref().unwrap());
    true
}

async fn run(config: Config) -> Result<()> {
    let cancellation_token = create_pipeline_cancellation_token();

    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("retention pipeline start.");

    let mut pipeline = match RetentionPipeline::from_config(config, cancellation_token) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(exit_code_from_error(&e));
        }
    };

    match pipeline.run().await {
        Ok(summary) => {
            let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
            print_summary(&summary);

            if summary.is_full_success() {
                debug!(
                    duration_sec = duration_sec,
                    "mailprune has been completed."
                );
                Ok(())
            } else {
                error!(
                    duration_sec = duration_sec,
                    failed_batches = summary.failed_batches,
                    failed_items = summary.failed_items,
                    "mailprune completed with failed batches.",
                );
                std::process::exit(
                    PruneError::PartialFailure {
                        trashed: summary.trashed,
                        failed: summary.failed_items,
                    }
                    .exit_code(),
                );
            }
        }
        Err(e) => {
            if is_cancelled_error(&e) {
                debug!("retention run cancelled by user.");
                return Ok(());
            }
            error!("{e:#}");
            std::process::exit(exit_code_from_error(&e));
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("listed:       {}", summary.listed);
    if summary.dry_run {
        println!("would trash:  {} (dry run)", summary.would_trash);
    } else {
        println!("trashed:      {}", summary.trashed);
    }
    println!("batches:      {}", summary.batches);
    println!(
        "failed:       {} item(s) in {} batch(es)",
        summary.failed_items, summary.failed_batches
    );
    if summary.cancelled {
        println!("cancelled before completion; progress above is partial.");
    }
}
