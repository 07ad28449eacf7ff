//! Periodic extraction of completed windows
//!
//! Event arrival and tick firing are not synchronized, so the newest window
//! may still be filling when a tick fires. Only the earliest window is
//! treated as complete, and only one window leaves the table per tick. A
//! backlog therefore drains oldest-first over consecutive ticks.

use crate::aggregate::AggregationTable;
use crate::metrics::PipelineMetrics;
use crate::relay::Relay;
use crate::window::{NodeSnapshot, WindowKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default period between drain ticks
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(10);

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Table was empty
    Idle,
    /// Window was removed and accepted by the collector
    Relayed(WindowKey),
    /// Window was removed but the relay failed; it is gone for good
    Dropped(WindowKey),
}

pub struct DrainScheduler {
    table: AggregationTable,
    relay: Arc<dyn Relay>,
    node_id: String,
    period: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl DrainScheduler {
    pub fn new(
        table: AggregationTable,
        relay: Arc<dyn Relay>,
        node_id: impl Into<String>,
        period: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            table,
            relay,
            node_id: node_id.into(),
            period,
            metrics,
        }
    }

    /// Drain the earliest window and relay it
    pub async fn tick(&self) -> DrainOutcome {
        self.metrics.table_windows.set(self.table.len() as i64);

        let Some(key) = self.table.earliest() else {
            debug!("No windows to drain");
            return DrainOutcome::Idle;
        };

        // The scheduler is the only remover, so the key is still present
        let Some(counters) = self.table.drain(key) else {
            return DrainOutcome::Idle;
        };
        self.metrics.windows_drained.inc();
        self.metrics.table_windows.set(self.table.len() as i64);

        info!(
            window = key.get(),
            ctx_switches_graceful = counters.ctx_switches_graceful,
            ctx_switches_forced = counters.ctx_switches_forced,
            mem_bytes_allocated = counters.mem_bytes_allocated,
            page_faults = counters.page_faults,
            fs_read_count = counters.fs_read_count,
            fs_read_size_kb = counters.fs_read_size_kb,
            fs_write_count = counters.fs_write_count,
            fs_write_size_kb = counters.fs_write_size_kb,
            "Drained window"
        );

        let snapshot = NodeSnapshot::new(self.node_id.clone(), counters);
        match self.relay.send(&snapshot).await {
            Ok(()) => {
                self.metrics.windows_relayed.inc();
                DrainOutcome::Relayed(key)
            }
            Err(e) => {
                warn!(
                    "Failed to relay window {} to {}: {}. Window dropped.",
                    key,
                    self.relay.target(),
                    e
                );
                self.metrics.windows_dropped.inc();
                DrainOutcome::Dropped(key)
            }
        }
    }

    /// Tick every period until `cancel` fires. The first tick is one period
    /// after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Drain scheduler running every {:?} for node {}",
            self.period, self.node_id
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Drain scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::window::WindowCounters;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every snapshot it accepts; fails the first `failures` sends
    struct RecordingRelay {
        sent: Mutex<Vec<NodeSnapshot>>,
        failures: AtomicUsize,
    }

    impl RecordingRelay {
        fn new(failures: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failures: AtomicUsize::new(failures),
            }
        }

        fn sent(&self) -> Vec<NodeSnapshot> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Relay for RecordingRelay {
        async fn send(&self, snapshot: &NodeSnapshot) -> Result<(), RelayError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RelayError::Transport("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        fn target(&self) -> &str {
            "memory"
        }
    }

    fn scheduler(failures: usize) -> (DrainScheduler, AggregationTable, Arc<RecordingRelay>) {
        let table = AggregationTable::new();
        let relay = Arc::new(RecordingRelay::new(failures));
        let metrics = Arc::new(PipelineMetrics::new().unwrap());
        let scheduler = DrainScheduler::new(
            table.clone(),
            relay.clone(),
            "node-a",
            Duration::from_millis(20),
            metrics,
        );
        (scheduler, table, relay)
    }

    #[tokio::test]
    async fn test_empty_table_is_idle() {
        let (scheduler, _, relay) = scheduler(0);

        assert_eq!(scheduler.tick().await, DrainOutcome::Idle);
        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_windows_drain_earliest_first_once_each() {
        let (scheduler, table, relay) = scheduler(0);
        for key in [12, 10, 14, 11] {
            table.update(WindowKey(key), |c| c.page_faults = key);
        }

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(scheduler.tick().await);
        }

        assert_eq!(
            outcomes,
            vec![
                DrainOutcome::Relayed(WindowKey(10)),
                DrainOutcome::Relayed(WindowKey(11)),
                DrainOutcome::Relayed(WindowKey(12)),
                DrainOutcome::Relayed(WindowKey(14)),
                DrainOutcome::Idle,
                DrainOutcome::Idle,
            ]
        );
        let faults: Vec<u64> = relay
            .sent()
            .iter()
            .map(|s| s.counters.page_faults)
            .collect();
        assert_eq!(faults, vec![10, 11, 12, 14]);
        assert!(relay.sent().iter().all(|s| s.node_id == "node-a"));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_drained_window_is_not_reemitted() {
        let (scheduler, table, relay) = scheduler(0);
        table.update(WindowKey(1), |c| c.page_faults = 3);

        assert_eq!(scheduler.tick().await, DrainOutcome::Relayed(WindowKey(1)));
        assert_eq!(scheduler.tick().await, DrainOutcome::Idle);

        // A later window is independent of the one already shipped
        table.update(WindowKey(2), |c| c.page_faults = 1);
        assert_eq!(scheduler.tick().await, DrainOutcome::Relayed(WindowKey(2)));
        assert_eq!(relay.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_relays_drop_windows_and_continue() {
        let (scheduler, table, relay) = scheduler(3);
        for key in 1..=4 {
            table.update(WindowKey(key), |c| c.fs_read_count = key);
        }

        let outcomes = [
            scheduler.tick().await,
            scheduler.tick().await,
            scheduler.tick().await,
            scheduler.tick().await,
        ];

        assert_eq!(
            outcomes,
            [
                DrainOutcome::Dropped(WindowKey(1)),
                DrainOutcome::Dropped(WindowKey(2)),
                DrainOutcome::Dropped(WindowKey(3)),
                DrainOutcome::Relayed(WindowKey(4)),
            ]
        );
        let sent = relay.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].counters.fs_read_count, 4);
        assert_eq!(scheduler.metrics.windows_dropped.get(), 3);
        assert_eq!(scheduler.metrics.windows_relayed.get(), 1);
    }

    #[tokio::test]
    async fn test_run_ticks_until_cancelled() {
        let (scheduler, table, relay) = scheduler(0);
        table.update(WindowKey(7), |c| {
            *c = WindowCounters {
                page_faults: 3,
                mem_bytes_allocated: 4096,
                ..Default::default()
            }
        });

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        tokio::time::timeout(Duration::from_secs(5), async {
            while relay.sent().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("window should be relayed");

        cancel.cancel();
        handle.await.unwrap();

        let sent = relay.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].counters.page_faults, 3);
        assert_eq!(sent[0].counters.mem_bytes_allocated, 4096);
    }
}
