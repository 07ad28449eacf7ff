//! Concurrent window table shared by every per-CPU reader
//!
//! Entries are keyed by [`WindowKey`]. The dashmap entry API holds the shard
//! write lock across insert-or-get and the mutation that follows, so racing
//! writers on a fresh key converge on a single entry and no increment is lost.

use crate::window::{WindowCounters, WindowKey};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe map from window key to accumulated counters
#[derive(Clone, Default)]
pub struct AggregationTable {
    windows: Arc<DashMap<WindowKey, WindowCounters>>,
}

impl AggregationTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the counters for `key`, inserting zeroed counters if absent.
    ///
    /// The returned guard holds the shard lock; do not call back into the
    /// table while it is alive.
    pub fn get_or_create(&self, key: WindowKey) -> RefMut<'_, WindowKey, WindowCounters> {
        self.windows.entry(key).or_default()
    }

    /// Run `f` against the counters for `key` as one atomic read-modify-write
    pub fn update<F>(&self, key: WindowKey, f: F)
    where
        F: FnOnce(&mut WindowCounters),
    {
        let mut counters = self.get_or_create(key);
        f(counters.value_mut());
    }

    /// Remove `key` and return its counters
    pub fn drain(&self, key: WindowKey) -> Option<WindowCounters> {
        self.windows.remove(&key).map(|(_, counters)| counters)
    }

    /// Keys currently present, in no particular order
    pub fn keys(&self) -> Vec<WindowKey> {
        self.windows.iter().map(|entry| *entry.key()).collect()
    }

    /// Oldest window currently present
    pub fn earliest(&self) -> Option<WindowKey> {
        self.keys().into_iter().min()
    }

    /// Copy of the counters for `key` without removing it
    pub fn peek(&self, key: WindowKey) -> Option<WindowCounters> {
        self.windows.get(&key).map(|entry| *entry.value())
    }

    /// Get the number of windows held
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_get_or_create_starts_at_zero() {
        let table = AggregationTable::new();

        {
            let counters = table.get_or_create(WindowKey(5));
            assert_eq!(*counters, WindowCounters::default());
        }

        assert_eq!(table.len(), 1);
        assert_eq!(table.keys(), vec![WindowKey(5)]);
    }

    #[test]
    fn test_drain_removes_key() {
        let table = AggregationTable::new();
        table.update(WindowKey(1), |c| c.page_faults += 4);

        let drained = table.drain(WindowKey(1)).expect("Should drain entry");
        assert_eq!(drained.page_faults, 4);

        assert!(table.is_empty());
        assert!(table.drain(WindowKey(1)).is_none());
    }

    #[test]
    fn test_earliest_is_minimum_key() {
        let table = AggregationTable::new();
        for key in [9, 3, 7] {
            table.update(WindowKey(key), |c| c.page_faults += 1);
        }

        assert_eq!(table.earliest(), Some(WindowKey(3)));
        assert_eq!(AggregationTable::new().earliest(), None);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: u64 = 10_000;

        let table = AggregationTable::new();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let table = table.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        table.update(WindowKey(42), |c| {
                            c.page_faults += 1;
                            c.mem_bytes_allocated += 3;
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let counters = table.peek(WindowKey(42)).unwrap();
        assert_eq!(counters.page_faults, THREADS as u64 * PER_THREAD);
        assert_eq!(counters.mem_bytes_allocated, 3 * THREADS as u64 * PER_THREAD);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_racing_creators_share_one_entry() {
        const THREADS: usize = 16;

        for round in 0..50u64 {
            let table = AggregationTable::new();
            let barrier = Arc::new(Barrier::new(THREADS));
            let key = WindowKey(round);

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let table = table.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        table.update(key, |c| c.fs_write_count += 1);
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(table.len(), 1);
            assert_eq!(table.peek(key).unwrap().fs_write_count, THREADS as u64);
        }
    }
}
