use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tally::aggregate::{AggregationTable, EventIngestor};
use tally::drain::{DrainOutcome, DrainScheduler};
use tally::ebpf::events::KernelEvent;
use tally::error::{RelayError, TallyError};
use tally::metrics::PipelineMetrics;
use tally::relay::Relay;
use tally::{NodeSnapshot, WindowCounters, WindowDuration, WindowKey};
use tokio::sync::mpsc;

struct ChannelRelay {
    tx: mpsc::UnboundedSender<NodeSnapshot>,
}

#[async_trait]
impl Relay for ChannelRelay {
    async fn send(&self, snapshot: &NodeSnapshot) -> Result<(), RelayError> {
        self.tx
            .send(snapshot.clone())
            .map_err(|e| RelayError::Transport(e.to_string()))
    }

    fn target(&self) -> &str {
        "channel"
    }
}

fn pipeline(
    node_id: &str,
) -> (
    EventIngestor,
    DrainScheduler,
    mpsc::UnboundedReceiver<NodeSnapshot>,
) {
    let table = AggregationTable::new();
    let metrics = Arc::new(PipelineMetrics::new().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    let ingestor = EventIngestor::new(
        table.clone(),
        WindowDuration::default(),
        metrics.clone(),
    );
    let scheduler = DrainScheduler::new(
        table,
        Arc::new(ChannelRelay { tx }),
        node_id,
        Duration::from_secs(10),
        metrics,
    );
    (ingestor, scheduler, rx)
}

#[test]
fn test_error_types() {
    let err = TallyError::UnknownEventKind { kind: 77 };
    assert!(err.to_string().contains("77"));

    let err = RelayError::Status { status: 503 };
    assert!(err.to_string().contains("503"));
}

#[test]
fn test_version_const() {
    assert!(!tally::VERSION.is_empty());
}

#[tokio::test]
async fn test_one_window_end_to_end() {
    let (ingestor, scheduler, mut rx) = pipeline("node-1");
    let t0 = 1_700_000_000_000_000_000u64;

    for i in 0..3 {
        ingestor.ingest(t0 + i, &KernelEvent::PageFault);
    }
    ingestor.ingest(t0 + 10, &KernelEvent::Alloc { bytes: 4096 });

    let key = WindowKey::from_timestamp_ns(t0, WindowDuration::default());
    assert_eq!(scheduler.tick().await, DrainOutcome::Relayed(key));

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.node_id, "node-1");
    assert_eq!(
        snapshot.counters,
        WindowCounters {
            page_faults: 3,
            mem_bytes_allocated: 4096,
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn test_backlog_drains_in_key_order_across_ticks() {
    let (ingestor, scheduler, mut rx) = pipeline("node-1");
    let window = Duration::from_secs(10).as_nanos() as u64;

    // Concurrent writers spread over five windows, newest first
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ingestor = ingestor.clone();
            std::thread::spawn(move || {
                for w in (0..5u64).rev() {
                    for _ in 0..100 {
                        ingestor.ingest(w * window + 1, &KernelEvent::FsRead { bytes: 1999 });
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for expected in 0..5u64 {
        assert_eq!(
            scheduler.tick().await,
            DrainOutcome::Relayed(WindowKey(expected))
        );
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.counters.fs_read_count, 400);
        assert_eq!(snapshot.counters.fs_read_size_kb, 400);
    }
    assert_eq!(scheduler.tick().await, DrainOutcome::Idle);
    assert!(rx.try_recv().is_err());
}
