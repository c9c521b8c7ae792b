mod output;
mod runner;
mod targets;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ppi_scraper::{build_client, HtmlPage};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::runner::RunSettings;

#[derive(Debug, Parser)]
#[command(name = "ppi")]
#[command(about = "Product price intelligence: scrape retailer product pages into a CSV")]
struct Cli {
    /// Retailer flow definitions (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Targets CSV with `retailer_id` and `product_id` columns
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Result CSV to write
    #[arg(long)]
    output: Option<PathBuf>,

    /// Maximum number of lookups in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Only process targets of this retailer
    #[arg(long)]
    retailer: Option<String>,

    /// Save the last document of failed lookups to this directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Validate the retailer config, print the normalized flows, and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn apply(&self, config: &mut ppi_core::AppConfig) {
        if let Some(path) = &self.config {
            config.retailers_path.clone_from(path);
        }
        if let Some(path) = &self.targets {
            config.targets_path.clone_from(path);
        }
        if let Some(path) = &self.output {
            config.output_path.clone_from(path);
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent_lookups = n.max(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ppi_core::load_app_config()?;
    cli.apply(&mut config);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let retailers = ppi_core::load_retailers(&config.retailers_path)?;
    if cli.check {
        let flows = ppi_core::normalize_retailers(&retailers)?;
        print!("{}", serde_yaml::to_string(&flows)?);
        return Ok(());
    }

    let interpreters = runner::build_interpreters(
        &retailers,
        Duration::from_millis(config.retry_delay_ms),
    )?;
    let targets = targets::load_targets(&config.targets_path)?;
    let client = build_client(config.request_timeout_secs, &config.user_agent)?;

    tracing::info!(
        env = %config.env,
        retailers = interpreters.len(),
        targets = targets.len(),
        concurrency = config.max_concurrent_lookups,
        output = %config.output_path.display(),
        "starting run"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let settings = RunSettings {
        concurrency: config.max_concurrent_lookups,
        retailer_filter: cli.retailer.clone(),
        debug_dir: cli.debug_dir.clone(),
    };
    let mut writer = output::create_output(&config.output_path)?;
    let summary = runner::run_targets(
        &targets,
        &interpreters,
        || HtmlPage::new(client.clone()),
        &mut writer,
        &settings,
        &cancel,
    )
    .await?;

    tracing::info!(
        rows = summary.rows,
        succeeded = summary.succeeded,
        not_found = summary.not_found,
        failed = summary.failed,
        "run complete"
    );
    println!(
        "wrote {} rows to {} ({} ok, {} not found, {} failed)",
        summary.rows,
        config.output_path.display(),
        summary.succeeded,
        summary.not_found,
        summary.failed
    );
    if cancel.is_cancelled() {
        anyhow::bail!("run interrupted");
    }
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("ctrl-c received; cancelling in-flight lookups");
        cancel.cancel();
    }
}
