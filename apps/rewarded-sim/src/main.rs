use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

mod adapters;
mod config;
mod scenario;
mod telemetry;

use config::{Cli, SimConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = SimConfig::try_from(Cli::parse())?;
    telemetry::init_tracing(&cfg.engine.log_filter);
    info!(
        ad_host = %cfg.engine.ad_host,
        load_timeout_ms = cfg.engine.default_load_timeout.as_millis() as u64,
        backend = ?cfg.backend,
        "starting rewarded-sim"
    );

    let print_metrics = cfg.print_metrics;
    tokio::select! {
        result = scenario::run(cfg) => result?,
        _ = tokio::signal::ctrl_c() => warn!("interrupted; abandoning simulation"),
    }

    if print_metrics {
        println!("{}", String::from_utf8_lossy(&rewarded_engine::metrics::gather()));
    }
    Ok(())
}
