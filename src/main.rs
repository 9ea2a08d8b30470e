use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use asana_extractor::api::AsanaClient;
use asana_extractor::config::{self, Overrides};
use asana_extractor::extractor::Extractor;
use asana_extractor::jobs::{ExtractionJob, ResourceKind};
use asana_extractor::scheduler::Scheduler;
use asana_extractor::shutdown::shutdown_signal;
use asana_extractor::storage::{FileStorage, SnapshotSink};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Periodically extract Asana users and projects into JSON snapshots"
)]
struct Args {
    /// Path to an optional YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Asana personal access token (required unless set in the config file)
    #[arg(long)]
    asana_access_token: Option<String>,

    /// Asana API base URL
    #[arg(long)]
    asana_host: Option<String>,

    /// Time between extraction runs: `30s` or `5m`
    #[arg(long)]
    extraction_period: Option<String>,

    /// Directory receiving the JSON snapshots
    #[arg(long)]
    output_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(
        args.config.as_deref(),
        Overrides {
            access_token: args.asana_access_token,
            host: args.asana_host,
            extraction_period: args.extraction_period,
            output_dir: args.output_dir,
        },
    )?;
    cfg.ensure_dirs()?;
    let period = cfg.extraction_period()?;

    let client = AsanaClient::new(cfg.api_base_url()?, cfg.asana.access_token.clone())?
        .with_retry_policy(cfg.retry_policy());
    let extractor = Extractor::new(Arc::new(client)).with_page_limit(cfg.asana.page_limit);
    let storage: Arc<dyn SnapshotSink> = Arc::new(FileStorage::new(&cfg.output.dir));

    info!(
        pid = std::process::id(),
        %period,
        output_dir = %cfg.output.dir,
        "asana extractor running"
    );

    let mut scheduler = Scheduler::new();
    for kind in ResourceKind::ALL {
        scheduler.schedule(
            kind.job_name(),
            period.interval(),
            ExtractionJob::new(extractor.clone(), storage.clone(), kind),
        )?;
    }

    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    scheduler.wait().await;
    scheduler.join().await;
    info!("asana extractor stopped");
    Ok(())
}
