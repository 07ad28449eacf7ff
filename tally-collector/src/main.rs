use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tally_collector::query::PrometheusProxy;
use tally_collector::{AppState, MetricsIngestionService};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "tally-collector")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Collects per-node window snapshots and republishes them for Prometheus", long_about = None)]
struct Cli {
    #[arg(
        long,
        env = "TALLY_COLLECTOR_HOST",
        default_value = "0.0.0.0",
        help = "Address to bind"
    )]
    host: String,

    #[arg(
        short,
        long,
        env = "TALLY_COLLECTOR_PORT",
        default_value_t = 5000,
        help = "Port to bind"
    )]
    port: u16,

    #[arg(long, env = "PROMETHEUS_URL", help = "Prometheus base URL backing /query")]
    prometheus_url: Option<String>,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting tally-collector v{}", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(MetricsIngestionService::new()?);
    let proxy = cli
        .prometheus_url
        .map(|url| PrometheusProxy::new(url, QUERY_TIMEOUT))
        .transpose()?;
    match &proxy {
        Some(proxy) => info!("Proxying /query to {}", proxy.base_url()),
        None => info!("No Prometheus URL configured, /query is disabled"),
    }

    let bind_addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("listening on {bind_addr}"))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        shutdown.cancel();
    });

    tally_collector::serve(listener, AppState::new(service, proxy), cancel).await?;

    info!("tally-collector stopped");
    Ok(())
}
