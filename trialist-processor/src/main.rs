//! trialist-processor - N-of-1 trial analysis batch job
//!
//! Runs once per invocation (normally from a scheduler): resolves trials for
//! one campaign, submits the finished ones to the analysis service and
//! stores the results. Always reports how many trials were processed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trialist_common::config::{ConfigResolver, ServiceSettings};
use trialist_common::time::today_utc;

use trialist_processor::db::{self, SqliteSurveyRepository};
use trialist_processor::{HttpAnalysisGateway, RunFlags, RunParameters, RunSummary};

/// Command-line arguments for trialist-processor
#[derive(Parser, Debug)]
#[command(name = "trialist-processor")]
#[command(about = "Resolve, normalize and analyze finished N-of-1 trials")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Survey database URL (overrides TRIALIST_DATABASE_URL and the config file)
    #[arg(long)]
    database_url: Option<String>,

    /// Also process trials that already have results
    #[arg(long)]
    reprocess: bool,

    /// Process every finished trial regardless of end date
    #[arg(long)]
    reprocess_all: bool,

    /// Process trials ending on this date (default: yesterday, UTC)
    #[arg(long, value_name = "YYYY-MM-DD")]
    trial_end_date: Option<NaiveDate>,

    /// Campaign to process (default: from config)
    #[arg(long)]
    campaign_id: Option<String>,

    /// Run parameters as one JSON object with keys reprocess, reprocess-all,
    /// trial-end-date and campaign-id
    #[arg(
        value_name = "JSON",
        conflicts_with_all = ["reprocess", "reprocess_all", "trial_end_date", "campaign_id"]
    )]
    parameters: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let loaded = resolver.load();

    // RUST_LOG wins over the configured level
    let level = loaded
        .as_ref()
        .map(|loaded| loaded.config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "trialist-processor v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let loaded = loaded.context("Failed to load configuration")?;
    loaded.source.log();
    let settings = ServiceSettings::resolve(args.database_url.as_deref(), &loaded.config)
        .context("Invalid configuration")?;

    let today = today_utc();
    let params = run_parameters(&args, today, &settings.default_campaign_id)
        .context("Invalid run parameters")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    info!(
        campaign_id = %params.campaign_id,
        trial_end_date = %params.trial_end_date,
        reprocess = params.reprocess,
        reprocess_all = params.reprocess_all,
        "Starting run"
    );

    let mut summary = RunSummary::default();
    let outcome = runtime.block_on(execute(&settings, &params, today, &mut summary));

    info!("Processed {} trial(s)", summary.processed);
    info!(
        resolved = summary.resolved,
        eligible = summary.eligible,
        failed_normalization = summary.failed_normalization,
        failed_submission = summary.failed_submission,
        "Ending run"
    );

    outcome
}

fn run_parameters(args: &Args, today: NaiveDate, default_campaign_id: &str) -> trialist_common::Result<RunParameters> {
    match &args.parameters {
        Some(json) => RunParameters::from_json(json),
        None => RunParameters::from_flags(
            RunFlags {
                reprocess: args.reprocess,
                reprocess_all: args.reprocess_all,
                trial_end_date: args.trial_end_date,
                campaign_id: args.campaign_id.clone(),
            },
            today,
            default_campaign_id,
        ),
    }
}

async fn execute(
    settings: &ServiceSettings,
    params: &RunParameters,
    today: NaiveDate,
    summary: &mut RunSummary,
) -> Result<()> {
    let gateway = HttpAnalysisGateway::new(settings.analysis_url.clone(), settings.request_timeout)
        .context("Failed to create analysis client")?;
    info!("Analysis service: {}", gateway.url());

    let pool = db::init_database_pool(&settings.database_url)
        .await
        .context("Failed to open survey database")?;
    info!("Database connection established");
    let repository = SqliteSurveyRepository::new(pool);

    let result = trialist_processor::run(&repository, &gateway, params, today, summary).await;
    repository.pool().close().await;

    result.context("Run aborted")
}
