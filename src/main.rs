// =============================================================================
// crowdpulse — cross-exchange crowd-positioning snapshot collector
// =============================================================================
//
// Runs the aggregation pipeline exactly once and exits; scheduling is the
// operator's concern (cron, systemd timer, CI job).

mod archive;
mod config;
mod exchanges;
mod http;
mod pipeline;
mod signal;
mod types;
mod universe;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;

const CONFIG_PATH: &str = "crowdpulse.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("crowdpulse — collecting cross-exchange crowd positioning");

    let config = PipelineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        PipelineConfig::default()
    });

    let client = http::build_client()?;

    let started = std::time::Instant::now();
    let summary = pipeline::run(&client, &config).await?;

    info!(
        coins = summary.coins,
        binance_readings = summary.binance_readings,
        bybit_readings = summary.bybit_readings,
        histories = summary.histories,
        archive_days = summary.archive_days,
        elapsed_secs = started.elapsed().as_secs(),
        "pipeline run complete"
    );

    Ok(())
}
