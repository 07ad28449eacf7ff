//! Last-known counters per node
//!
//! Each snapshot replaces the node's whole record. The value exposed for a
//! node is its most recent window, not a running total; rates and sums are
//! left to the time-series store that scrapes us.

use crate::error::{CollectorError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tally::{NodeSnapshot, WindowCounters};

#[derive(Default)]
pub struct NodeMetricState {
    nodes: RwLock<HashMap<String, WindowCounters>>,
}

impl NodeMetricState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot` as the node's current value. Returns true if the node
    /// was not known before.
    pub fn ingest(&self, snapshot: NodeSnapshot) -> Result<bool> {
        if snapshot.node_id.is_empty() {
            return Err(CollectorError::MissingNodeId);
        }

        let previous = self
            .nodes
            .write()
            .insert(snapshot.node_id, snapshot.counters);
        Ok(previous.is_none())
    }

    pub fn get(&self, node_id: &str) -> Option<WindowCounters> {
        self.nodes.read().get(node_id).copied()
    }

    /// Consistent copy of every node's record, ordered by node id
    pub fn snapshot(&self) -> BTreeMap<String, WindowCounters> {
        self.nodes
            .read()
            .iter()
            .map(|(node, counters)| (node.clone(), *counters))
            .collect()
    }

    /// `(metric_name, node_id) -> value` for every node and metric
    pub fn snapshot_for_exposition(&self) -> BTreeMap<(&'static str, String), u64> {
        self.snapshot()
            .into_iter()
            .flat_map(|(node, counters)| {
                counters
                    .fields()
                    .into_iter()
                    .map(move |(metric, value)| ((metric, node.clone()), value))
            })
            .collect()
    }

    /// Node ids that have reported at least once, sorted
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.nodes.read().keys().cloned().collect();
        nodes.sort();
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
