//! Command-line configuration for the agent

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tally::relay::DEFAULT_COLLECTOR_URL;
use tally::WindowDuration;

/// Checked after `--node-id`/`TALLY_NODE_ID`, before the hostname
const NODE_NAME_ENV: &str = "NODE_NAME";

#[derive(Parser, Debug, Clone)]
#[command(name = "tally-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregates kernel events into windows and relays them to the collector", long_about = None)]
pub struct Cli {
    #[arg(long, env = "TALLY_NODE_ID", help = "Node identity reported to the collector")]
    pub node_id: Option<String>,

    #[arg(
        long,
        env = "TALLY_COLLECTOR_URL",
        default_value = DEFAULT_COLLECTOR_URL,
        help = "Collector push endpoint"
    )]
    pub collector_url: String,

    #[arg(long, default_value_t = 10, help = "Aggregation window width in seconds")]
    pub window_secs: u64,

    #[arg(long, default_value_t = 10, help = "Seconds between drain ticks")]
    pub drain_interval_secs: u64,

    #[arg(long, default_value_t = 5, help = "Relay request timeout in seconds")]
    pub relay_timeout_secs: u64,

    #[arg(
        long,
        env = "TALLY_METRICS_ADDR",
        default_value = "0.0.0.0:9000",
        help = "Address for the /metrics and /healthz endpoints"
    )]
    pub metrics_addr: SocketAddr,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

/// Validated agent settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node_id: String,
    pub collector_url: String,
    pub window: WindowDuration,
    pub drain_interval: Duration,
    pub relay_timeout: Duration,
    pub metrics_addr: SocketAddr,
}

impl AgentConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let node_id = resolve_node_id(cli.node_id.clone(), std::env::var(NODE_NAME_ENV).ok())?;
        Self::with_node_id(cli, node_id)
    }

    fn with_node_id(cli: Cli, node_id: String) -> Result<Self> {
        let window = WindowDuration::new(Duration::from_secs(cli.window_secs))
            .context("invalid --window-secs")?;

        if cli.drain_interval_secs == 0 {
            return Err(anyhow!("--drain-interval-secs must be greater than zero"));
        }
        if cli.relay_timeout_secs == 0 {
            return Err(anyhow!("--relay-timeout-secs must be greater than zero"));
        }

        Ok(Self {
            node_id,
            collector_url: cli.collector_url,
            window,
            drain_interval: Duration::from_secs(cli.drain_interval_secs),
            relay_timeout: Duration::from_secs(cli.relay_timeout_secs),
            metrics_addr: cli.metrics_addr,
        })
    }
}

fn resolve_node_id(explicit: Option<String>, node_name: Option<String>) -> Result<String> {
    let configured = explicit
        .filter(|id| !id.is_empty())
        .or_else(|| node_name.filter(|id| !id.is_empty()));
    if let Some(id) = configured {
        return Ok(id);
    }

    hostname::get()
        .context("reading hostname")?
        .into_string()
        .map_err(|raw| anyhow!("hostname is not valid UTF-8: {:?}", raw))
}
