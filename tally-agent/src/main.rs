//! tally-agent - Node agent for windowed kernel-event aggregation
//!
//! The agent runs on each node and:
//! - Loads the scheduler, memory and VFS probes into the kernel
//! - Reads their events from one perf buffer per CPU
//! - Accumulates them into fixed-width windows
//! - Relays the oldest completed window to the collector on every tick

use anyhow::Result;

#[cfg(not(all(target_os = "linux", feature = "ebpf")))]
fn main() -> Result<()> {
    eprintln!("Error: tally-agent was built without kernel probe support");
    eprintln!("Rebuild on Linux with `--features ebpf` (requires bpf-linker)");
    std::process::exit(1);
}

#[cfg(all(target_os = "linux", feature = "ebpf"))]
#[tokio::main]
async fn main() -> Result<()> {
    use anyhow::Context;
    use clap::Parser;
    use std::sync::Arc;
    use tally::aggregate::{AggregationTable, EventIngestor};
    use tally::drain::DrainScheduler;
    use tally::metrics::PipelineMetrics;
    use tally::relay::HttpRelay;
    use tally_agent::config::{AgentConfig, Cli};
    use tally_agent::probe_loader::ProbeManager;
    use tally_agent::server;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;
    use tracing::{error, info};
    use tracing_subscriber::EnvFilter;

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = AgentConfig::from_cli(cli)?;
    info!(
        "tally-agent v{} starting on node {} (window {:?}, drain every {:?})",
        env!("CARGO_PKG_VERSION"),
        config.node_id,
        config.window.as_duration(),
        config.drain_interval
    );

    let metrics = Arc::new(PipelineMetrics::new()?);
    let table = AggregationTable::new();
    let ingestor = EventIngestor::new(table.clone(), config.window, metrics.clone());
    let relay = Arc::new(HttpRelay::new(&config.collector_url, config.relay_timeout)?);
    info!("Relaying windows to {}", config.collector_url);

    let cancel = CancellationToken::new();

    let mut manager = ProbeManager::new()?;
    manager.attach_all()?;
    let readers = manager.spawn_readers(ingestor, metrics.clone(), cancel.clone())?;

    let listener = TcpListener::bind(config.metrics_addr)
        .await
        .with_context(|| format!("listening on {}", config.metrics_addr))?;
    let health = tokio::spawn(server::serve(listener, metrics.clone(), cancel.clone()));

    let scheduler = DrainScheduler::new(
        table,
        relay,
        config.node_id,
        config.drain_interval,
        metrics,
    );
    let drain = tokio::spawn(scheduler.run(cancel.clone()));

    info!("tally-agent running. Press Ctrl+C to exit.");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");
    cancel.cancel();

    if let Err(e) = drain.await {
        error!("Drain task failed: {}", e);
    }
    for reader in readers {
        if let Err(e) = reader.await {
            error!("Reader task failed: {}", e);
        }
    }
    match health.await {
        Ok(Err(e)) => error!("Health server error: {}", e),
        Err(e) => error!("Health server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    manager.unload();

    info!("tally-agent stopped");
    Ok(())
}
