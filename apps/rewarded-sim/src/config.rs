use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rewarded_engine::{DefaultEndpointBuilder, EngineConfig};

#[derive(Debug, Parser)]
#[command(
    name = "rewarded-sim",
    author,
    version,
    about = "Runs a rewarded mediation session and logs every listener event"
)]
pub struct Cli {
    /// Ad host to query. Without it the session runs against scripted responses.
    #[arg(long, env = "REWARDED_AD_HOST")]
    pub ad_host: Option<String>,

    /// Load timeout applied when a response carries no hint.
    #[arg(long, env = "REWARDED_LOAD_TIMEOUT_MS", default_value_t = 30_000)]
    pub load_timeout_ms: u64,

    /// tracing-subscriber filter directive.
    #[arg(
        long,
        env = "REWARDED_LOG_FILTER",
        default_value = "info,rewarded_engine=debug"
    )]
    pub log_filter: String,

    /// Comma-separated ad unit ids to load and show, in order.
    #[arg(
        long,
        env = "REWARDED_SIM_UNITS",
        value_delimiter = ',',
        default_value = "home,store"
    )]
    pub units: Vec<String>,

    /// Customer id forwarded with requests and completion confirmations.
    #[arg(long, env = "REWARDED_SIM_CUSTOMER_ID")]
    pub customer_id: Option<String>,

    /// Print the engine's Prometheus counters before exiting.
    #[arg(long, default_value_t = false)]
    pub print_metrics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Scripted,
    Live,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub engine: EngineConfig,
    pub backend: Backend,
    pub units: Vec<String>,
    pub customer_id: Option<String>,
    pub print_metrics: bool,
}

impl TryFrom<Cli> for SimConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.load_timeout_ms == 0 {
            bail!("load timeout must be greater than zero");
        }
        let units: Vec<String> = cli
            .units
            .into_iter()
            .map(|unit| unit.trim().to_string())
            .filter(|unit| !unit.is_empty())
            .collect();
        if units.is_empty() {
            bail!("at least one ad unit id is required");
        }

        let mut engine = EngineConfig {
            log_filter: cli.log_filter,
            ..EngineConfig::default()
        }
        .with_default_load_timeout(Duration::from_millis(cli.load_timeout_ms));
        let backend = match cli.ad_host {
            Some(host) => {
                DefaultEndpointBuilder::new(&host)
                    .with_context(|| format!("invalid ad host: {host}"))?;
                engine = engine.with_ad_host(host);
                Backend::Live
            }
            None => Backend::Scripted,
        };

        Ok(SimConfig {
            engine,
            backend,
            units,
            customer_id: cli.customer_id.filter(|id| !id.is_empty()),
            print_metrics: cli.print_metrics,
        })
    }
}
