//! Windowed kernel-event aggregation and relay
//!
//! Node side of the pipeline:
//! - [`aggregate::EventIngestor`] buckets typed kernel events by time window
//! - [`aggregate::AggregationTable`] accumulates counters from every CPU concurrently
//! - [`drain::DrainScheduler`] removes the earliest window each tick
//! - [`relay::Relay`] pushes the drained window to the collector

pub mod aggregate;
pub mod drain;
pub mod ebpf;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod window;

pub use error::{RelayError, Result, TallyError};
pub use window::{NodeSnapshot, WindowCounters, WindowDuration, WindowKey};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
