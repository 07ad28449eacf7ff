//! Prometheus view of the node state
//!
//! The node gauges are rebuilt from one consistent read of
//! [`NodeMetricState`] on every gather, so a scrape never mixes fields from
//! two different snapshots of the same node.

use crate::state::NodeMetricState;
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;
use tally::WindowCounters;

const NODE_LABEL: &str = "node_id";

/// Help text for each gauge, in [`WindowCounters::FIELD_NAMES`] order
const GAUGE_HELP: [&str; 8] = [
    "Memory bytes allocated",
    "Page faults recorded",
    "Graceful context switches",
    "Forced context switches",
    "File system read calls",
    "KB read from file system",
    "File system write calls",
    "KB written to file system",
];

/// One gauge family per window counter, labelled by node
pub struct NodeGauges {
    state: Arc<NodeMetricState>,
    /// In [`WindowCounters::FIELD_NAMES`] order
    gauges: Vec<GaugeVec>,
    collect_lock: Mutex<()>,
}

impl NodeGauges {
    pub fn new(state: Arc<NodeMetricState>) -> prometheus::Result<Self> {
        let gauges = WindowCounters::FIELD_NAMES
            .iter()
            .zip(GAUGE_HELP)
            .map(|(name, help)| GaugeVec::new(Opts::new(*name, help), &[NODE_LABEL]))
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self {
            state,
            gauges,
            collect_lock: Mutex::new(()),
        })
    }
}

impl Collector for NodeGauges {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges.iter().flat_map(|gauge| gauge.desc()).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _guard = self.collect_lock.lock();
        let snapshot = self.state.snapshot();

        for gauge in &self.gauges {
            gauge.reset();
        }
        for (node, counters) in &snapshot {
            for (gauge, (_, value)) in self.gauges.iter().zip(counters.fields()) {
                gauge.with_label_values(&[node.as_str()]).set(value as f64);
            }
        }

        self.gauges.iter().flat_map(|gauge| gauge.collect()).collect()
    }
}

const NAMESPACE: &str = "tally_collector";

/// Collector self-metrics
#[derive(Clone)]
pub struct CollectorMetrics {
    pub snapshots_ingested: IntCounter,
    pub snapshots_rejected: IntCounter,
    pub nodes_tracked: IntGauge,
}

impl CollectorMetrics {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let snapshots_ingested = IntCounter::with_opts(
            Opts::new(
                "snapshots_ingested_total",
                "Node snapshots accepted on the push endpoint.",
            )
            .namespace(NAMESPACE),
        )?;
        let snapshots_rejected = IntCounter::with_opts(
            Opts::new(
                "snapshots_rejected_total",
                "Push requests rejected as malformed.",
            )
            .namespace(NAMESPACE),
        )?;
        let nodes_tracked = IntGauge::with_opts(
            Opts::new("nodes_tracked", "Nodes that have reported at least once.")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(snapshots_ingested.clone()))?;
        registry.register(Box::new(snapshots_rejected.clone()))?;
        registry.register(Box::new(nodes_tracked.clone()))?;

        Ok(Self {
            snapshots_ingested,
            snapshots_rejected,
            nodes_tracked,
        })
    }
}
