use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chrome_client::ChromeDriver;
use prospector_common::Config;
use prospector_store::{LeadStore, MemoryLeadStore, PgLeadStore};

use prospector_pipeline::classifier::Classifier;
use prospector_pipeline::control::RunControl;
use prospector_pipeline::distributor;
use prospector_pipeline::maps::MapSession;
use prospector_pipeline::orchestrator::Orchestrator;
use prospector_pipeline::quality::{HeuristicAnalyzer, PagespeedAnalyzer, QualityAnalyzer};
use prospector_pipeline::worker::WorkerConfig;

#[derive(Parser)]
#[command(name = "prospector", about = "Map-search lead discovery pipeline")]
struct Cli {
    /// Scrape and classify without persisting anything. Leads land in an
    /// in-memory store that is discarded at exit.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("prospector=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let store: Arc<dyn LeadStore> = if cli.dry_run {
        info!("Dry run: leads will not be persisted");
        Arc::new(MemoryLeadStore::new())
    } else {
        let database_url = config
            .database_url
            .clone()
            .context("DATABASE_URL is required unless --dry-run is set")?;
        Arc::new(PgLeadStore::connect(&database_url).await?)
    };

    let analyzer: Arc<dyn QualityAnalyzer> = if config.pagespeed_api_key.is_empty() {
        info!("No scoring API key configured, using the local heuristic analyzer");
        Arc::new(HeuristicAnalyzer::new())
    } else {
        Arc::new(PagespeedAnalyzer::new(
            &config.pagespeed_api_key,
            config.quality_max_attempts,
            Duration::from_millis(config.quality_backoff_ms),
            Duration::from_secs(config.quality_timeout_secs),
        ))
    };

    let driver = Arc::new(ChromeDriver::launch().await?);
    let sources: Vec<MapSession> = (0..config.worker_count)
        .map(|_| MapSession::new(Arc::clone(&driver)))
        .collect();

    let assignments =
        distributor::assign(&config.locations, &config.categories, config.worker_count);
    let control = RunControl::new(config.target_lead_count);
    let classifier = Arc::new(Classifier::new(analyzer, config.quality_threshold));

    info!(
        workers = config.worker_count,
        terms = config.locations.len() * config.categories.len(),
        target = config.target_lead_count,
        "starting discovery run"
    );

    let orchestrator = Orchestrator::new(
        classifier,
        Arc::clone(&store),
        control.clone(),
        WorkerConfig::from_config(&config),
    );
    let summary = orchestrator.run(sources, assignments).await;

    // Workers are done, so every page-holding clone is gone by now.
    if let Ok(driver) = Arc::try_unwrap(driver) {
        if let Err(err) = driver.shutdown().await {
            warn!(error = %err, "browser shutdown failed");
        }
    }

    println!("{summary}");
    if summary.fatal_stop {
        std::process::exit(1);
    }
    Ok(())
}
