use crate::api::IngestRequest;
use crate::error::{CollectorError, Result};
use crate::exposition::{CollectorMetrics, NodeGauges};
use crate::state::NodeMetricState;
use prometheus::Registry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tally::NodeSnapshot;
use tracing::{debug, info};

/// Receives node snapshots and serves their latest values for scraping
pub struct MetricsIngestionService {
    state: Arc<NodeMetricState>,
    registry: Registry,
    metrics: CollectorMetrics,
}

impl MetricsIngestionService {
    pub fn new() -> Result<Self> {
        let state = Arc::new(NodeMetricState::new());
        let registry = Registry::new();

        registry.register(Box::new(NodeGauges::new(state.clone())?))?;
        let metrics = CollectorMetrics::register(&registry)?;

        Ok(Self {
            state,
            registry,
            metrics,
        })
    }

    pub fn ingest(&self, snapshot: NodeSnapshot) -> Result<()> {
        let node_id = snapshot.node_id.clone();

        match self.state.ingest(snapshot) {
            Ok(new_node) => {
                self.metrics.snapshots_ingested.inc();
                if new_node {
                    self.metrics.nodes_tracked.set(self.state.len() as i64);
                    info!("First snapshot from node {}", node_id);
                } else {
                    debug!("Updated metrics for node {}", node_id);
                }
                Ok(())
            }
            Err(e) => {
                self.metrics.snapshots_rejected.inc();
                Err(e)
            }
        }
    }

    /// Decode a push body at the boundary and ingest it
    pub fn ingest_json(&self, body: &[u8]) -> Result<()> {
        let snapshot = IngestRequest::from_slice(body).and_then(IngestRequest::into_snapshot);

        match snapshot {
            Ok(snapshot) => self.ingest(snapshot),
            Err(e) => {
                debug!("Rejected push: {:?}", e);
                self.metrics.snapshots_rejected.inc();
                Err(e)
            }
        }
    }

    pub fn snapshot_for_exposition(&self) -> BTreeMap<(&'static str, String), u64> {
        self.state.snapshot_for_exposition()
    }

    /// Render node gauges and self-metrics in the text exposition format
    pub fn render(&self) -> Result<String> {
        Ok(tally::metrics::encode_text(&self.registry)?)
    }

    pub fn nodes(&self) -> Vec<String> {
        self.state.nodes()
    }

    /// Number of nodes that have reported
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
