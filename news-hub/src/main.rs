use anyhow::Context;
use clap::Parser;
use news_hub::{FetchConfig, HubError, Pipeline, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_TIMEOUT: u8 = 3;

/// Build the static news digest site.
#[derive(Debug, Parser)]
#[command(name = "news-hub", version, about)]
struct Args {
    /// Directory holding news.yaml, public.yaml and overrides.yaml
    #[arg(long, env = "NEWS_HUB_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Where the site tree is published
    #[arg(long, env = "NEWS_HUB_OUT_DIR", default_value = "outputs/site")]
    out_dir: PathBuf,

    /// Cross-run dedup state file
    #[arg(long, env = "NEWS_HUB_STATE_PATH", default_value = "data/state.json")]
    state_path: PathBuf,

    /// Overall run-time ceiling
    #[arg(long, default_value_t = 300)]
    run_timeout_secs: u64,

    /// Ceiling for each individual source fetch
    #[arg(long, default_value_t = 20)]
    fetch_timeout_secs: u64,

    /// Render but do not publish or update state
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting NewsHub build (config: {})", args.config_dir.display());

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Process status for a failed run: configuration and run-ceiling failures
/// get their own codes, everything else is a generic failure.
fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<HubError>() {
        Some(HubError::Config(_)) => EXIT_CONFIG,
        Some(HubError::RunTimeout { .. }) => EXIT_TIMEOUT,
        _ => EXIT_FAILURE,
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = RunOptions {
        fetch: FetchConfig {
            timeout_seconds: args.fetch_timeout_secs,
            ..FetchConfig::default()
        },
        run_timeout: Duration::from_secs(args.run_timeout_secs),
        state_path: Some(args.state_path),
    };

    let pipeline = Pipeline::load(&args.config_dir, options)?;
    let report = pipeline.run().await?;
    report.log_summary();

    if args.dry_run {
        info!("Dry run: {} files rendered, nothing published", report.artifact.len());
        return Ok(());
    }

    pipeline
        .publish(&report, &args.out_dir)
        .with_context(|| format!("publishing site to {}", args.out_dir.display()))?;
    info!("NewsHub build finished");
    Ok(())
}
