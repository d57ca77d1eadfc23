//! pubsub-bench - Load generator for publish/subscribe brokers

use std::process::ExitCode;

use clap::Parser;
use pubsub_bench_core::BenchError;

mod cli;

use cli::RunStatus;

/// At least one role finished short of its requested workers
const EXIT_SHORTFALL: u8 = 4;
/// A join deadline elapsed under the fail-fast policy
const EXIT_TIMEOUT: u8 = 3;
const EXIT_ERROR: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    // Logs go to stderr so stdout carries only the report
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pubsub-bench starting");

    match cli.execute().await {
        Ok(RunStatus::Complete) => ExitCode::SUCCESS,
        Ok(RunStatus::Shortfall) => ExitCode::from(EXIT_SHORTFALL),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Process exit code for a fatal error
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<BenchError>() {
        Some(e) if e.is_timeout() => EXIT_TIMEOUT,
        _ => EXIT_ERROR,
    }
}
