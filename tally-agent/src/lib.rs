//! Node agent for tally (DaemonSet)
//!
//! Loads the kernel probes, feeds their events into the shared aggregation
//! table from one reader per CPU, and drains one completed window per tick to
//! the collector. Pipeline self-metrics are served on a local endpoint.

pub mod config;
pub mod server;

#[cfg(all(target_os = "linux", feature = "ebpf"))]
pub mod probe_loader;
