use crate::ebpf::EventKind;
use crate::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

const NAMESPACE: &str = "tally_agent";

/// Self-observability counters for the node-side pipeline.
///
/// Owned by the process entry point and shared by the ingestor, the drain
/// scheduler and the per-CPU readers.
pub struct PipelineMetrics {
    registry: Registry,
    /// Pre-resolved `events_ingested_total{kind}` children, indexed by [`EventKind::index`]
    events_ingested: [IntCounter; 5],
    pub events_dropped: IntCounter,
    pub events_lost: IntCounter,
    pub windows_drained: IntCounter,
    pub windows_relayed: IntCounter,
    pub windows_dropped: IntCounter,
    pub table_windows: IntGauge,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_ingested_vec = IntCounterVec::new(
            Opts::new(
                "events_ingested_total",
                "Kernel events applied to the aggregation table.",
            )
            .namespace(NAMESPACE),
            &["kind"],
        )?;
        let events_dropped = IntCounter::with_opts(
            Opts::new(
                "events_dropped_total",
                "Probe records rejected as malformed or of unknown kind.",
            )
            .namespace(NAMESPACE),
        )?;
        let events_lost = IntCounter::with_opts(
            Opts::new(
                "events_lost_total",
                "Samples the kernel could not deliver because a perf buffer was full.",
            )
            .namespace(NAMESPACE),
        )?;
        let windows_drained = IntCounter::with_opts(
            Opts::new("windows_drained_total", "Windows removed from the table.")
                .namespace(NAMESPACE),
        )?;
        let windows_relayed = IntCounter::with_opts(
            Opts::new(
                "windows_relayed_total",
                "Windows delivered to the collector.",
            )
            .namespace(NAMESPACE),
        )?;
        let windows_dropped = IntCounter::with_opts(
            Opts::new(
                "windows_dropped_total",
                "Windows discarded after a failed relay.",
            )
            .namespace(NAMESPACE),
        )?;
        let table_windows = IntGauge::with_opts(
            Opts::new(
                "table_windows",
                "Windows currently held in the aggregation table.",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(events_ingested_vec.clone()))?;
        registry.register(Box::new(events_dropped.clone()))?;
        registry.register(Box::new(events_lost.clone()))?;
        registry.register(Box::new(windows_drained.clone()))?;
        registry.register(Box::new(windows_relayed.clone()))?;
        registry.register(Box::new(windows_dropped.clone()))?;
        registry.register(Box::new(table_windows.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        let events_ingested =
            EventKind::ALL.map(|kind| events_ingested_vec.with_label_values(&[kind.as_str()]));

        Ok(Self {
            registry,
            events_ingested,
            events_dropped,
            events_lost,
            windows_drained,
            windows_relayed,
            windows_dropped,
            table_windows,
        })
    }

    pub fn record_event(&self, kind: EventKind) {
        self.events_ingested[kind.index()].inc();
    }

    pub fn events_ingested(&self, kind: EventKind) -> u64 {
        self.events_ingested[kind.index()].get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
