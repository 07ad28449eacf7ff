//! Maps typed kernel events onto the window table

use super::AggregationTable;
use crate::ebpf::events::KernelEvent;
use crate::metrics::PipelineMetrics;
use crate::window::{WindowDuration, WindowKey};
use crate::Result;
use std::sync::Arc;
use tally_common::RawEvent;
use tracing::trace;

/// Applies events to the table. Cheap to clone, one clone per reader task.
#[derive(Clone)]
pub struct EventIngestor {
    table: AggregationTable,
    window: WindowDuration,
    metrics: Arc<PipelineMetrics>,
}

impl EventIngestor {
    pub fn new(
        table: AggregationTable,
        window: WindowDuration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            table,
            window,
            metrics,
        }
    }

    /// Apply one event observed at `timestamp_ns` and return its window
    pub fn ingest(&self, timestamp_ns: u64, event: &KernelEvent) -> WindowKey {
        let key = WindowKey::from_timestamp_ns(timestamp_ns, self.window);
        self.table.update(key, |counters| counters.apply(event));
        self.metrics.record_event(event.kind());
        key
    }

    /// Decode and apply a probe record. Unknown kinds are counted and skipped.
    pub fn ingest_raw(&self, raw: &RawEvent) -> Result<WindowKey> {
        match KernelEvent::try_from(raw) {
            Ok(event) => Ok(self.ingest(raw.timestamp_ns, &event)),
            Err(e) => {
                trace!("Dropping probe record: {}", e);
                self.metrics.events_dropped.inc();
                Err(e)
            }
        }
    }

    pub fn table(&self) -> &AggregationTable {
        &self.table
    }
}
