//! CLI entry point for abatcher.

use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::process::ExitCode;

use abatcher_core::{
    BatchConfig, BatchOptions, BatchStats, Batcher, RequestItem, collect_ordered,
};
use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tracing::{debug, info};

mod cli;
mod input;
mod output;
mod progress;

use cli::Args;
use output::{EXIT_FAILURE, EXIT_SUCCESS};
use progress::Progress;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > default (info)
fn init_tracing(args: &Args) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(args: Args) -> Result<u8> {
    debug!(?args, "CLI arguments parsed");

    let file_config = match &args.config {
        Some(path) => load_config(path)?,
        None => BatchConfig::default(),
    };
    let config = args.apply_to(file_config);

    let Some(items) = read_items(&args)? else {
        info!("No input provided. Pass URLs as arguments, use --input, or pipe items via stdin.");
        info!("Example: echo 'https://httpbin.org/get' | abatcher");
        return Ok(EXIT_SUCCESS);
    };

    let batcher = Batcher::new(config).context("invalid configuration")?;
    let options = BatchOptions::new().with_method(args.method.clone());
    let dispatches = batcher.stream(items, &options)?;
    let total = dispatches.total();
    info!(requests = total, method = %options.method, "starting batch");

    let mut progress = Progress::new(!args.quiet && io::stderr().is_terminal(), total);
    let collected = collect_ordered(
        dispatches.inspect(|(_, result)| progress.record(result)),
        total,
        batcher.config().raise_on_any_failure,
    )
    .await;
    progress.finish();
    let results = collected?;

    output::write_results(io::stdout().lock(), &results)?;

    let stats = BatchStats::from_results(&results);
    info!(
        succeeded = stats.succeeded(),
        failed = stats.failed(),
        total = stats.total(),
        "Batch complete"
    );
    Ok(output::exit_code(&stats))
}

fn load_config(path: &Path) -> Result<BatchConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Returns `None` when there is no input source at all.
fn read_items(args: &Args) -> Result<Option<Vec<RequestItem>>> {
    if !args.urls.is_empty() {
        return Ok(Some(args.urls.iter().cloned().map(RequestItem::Url).collect()));
    }
    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?;
        return input::parse_items(&text).map(Some);
    }
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read stdin")?;
    input::parse_items(&buffer).map(Some)
}
