//! `logroll` binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logroll::SinkRegistry;
use logroll_cli::{pipe, Cli};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // Stdin reads run on a blocking thread that may never return.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.sink_config().context("invalid configuration")?;
    let registry = SinkRegistry::new();
    let sink = registry
        .get_or_open(config)
        .await
        .context("cannot open log file")?;

    let tee = cli.tee.then(tokio::io::stdout);
    let result = tokio::select! {
        result = pipe(tokio::io::stdin(), &sink, tee) => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(None)
        }
    };

    registry.close_all().await;

    if let Some(summary) = result.context("failed to read input")? {
        info!(
            path = %sink.path().display(),
            chunks = summary.chunks,
            bytes = summary.bytes,
            failed = summary.failed,
            rotations = sink.stats().rotations,
            "done"
        );
    }
    Ok(())
}
