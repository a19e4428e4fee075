//! feedfilter binary entrypoint.
//! Loads the config, runs one filter pass, and maps failures to exit codes.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedfilter::error::exit;
use feedfilter::PipelineError;

#[derive(Debug, Parser)]
#[command(name = "feedfilter", version, about = "Filter a feed through an include_if rule and re-emit it")]
struct Cli {
    /// Config file (JSON or TOML). Defaults to $FEEDFILTER_CONFIG, then ./config.json, then ./config.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug-level logs for this crate.
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

/// Logs go to stderr; stdout may be carrying the feed.
fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "feedfilter=debug,pipeline=debug,source=debug,config=debug,rule=debug,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: &Cli) -> anyhow::Result<feedfilter::RunSummary> {
    let config = feedfilter::config::load(cli.config.as_deref())
        .map_err(PipelineError::from)
        .context("loading configuration")?;
    let from = config.from.clone();
    feedfilter::run_configured(config)
        .await
        .with_context(|| format!("filtering {from}"))
}

fn main() -> ExitCode {
    // Load .env in local/dev so FEEDFILTER_CONFIG / RUST_LOG can live there.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start tokio runtime");
            return ExitCode::from(exit::SOFTWARE);
        }
    };

    match rt.block_on(run(&cli)) {
        Ok(summary) => {
            tracing::info!(
                fetched = summary.fetched,
                kept = summary.kept,
                destination = %summary.destination,
                "done"
            );
            ExitCode::from(exit::SUCCESS)
        }
        Err(err) => {
            let code = err
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(exit::SOFTWARE);
            eprintln!("feedfilter: {err:#}");
            ExitCode::from(code)
        }
    }
}
