//! Data model for a single aggregation bucket
//!
//! A window is a fixed-duration slice of time identified by
//! `timestamp_ns / window_ns`. Counters only ever grow while their window is
//! open; the drain scheduler removes a window once and ships it as a
//! [`NodeSnapshot`].

use crate::ebpf::events::KernelEvent;
use crate::{Result, TallyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default width of an aggregation window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Bytes per KB for the filesystem size counters (decimal, truncating)
const BYTES_PER_KB: u64 = 1000;

/// Identifier of an aggregation window. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowKey(pub u64);

impl WindowKey {
    /// Compute the window a timestamp falls into
    pub fn from_timestamp_ns(timestamp_ns: u64, window: WindowDuration) -> Self {
        Self(timestamp_ns / window.as_nanos())
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated, non-zero window width in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDuration(u64);

impl WindowDuration {
    pub fn new(duration: Duration) -> Result<Self> {
        let nanos = u64::try_from(duration.as_nanos()).map_err(|_| {
            TallyError::ConfigError(format!("window duration {:?} is too large", duration))
        })?;

        if nanos == 0 {
            return Err(TallyError::ConfigError(
                "window duration must be greater than zero".to_string(),
            ));
        }

        Ok(Self(nanos))
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl Default for WindowDuration {
    fn default() -> Self {
        Self(DEFAULT_WINDOW.as_nanos() as u64)
    }
}

/// Counters accumulated over one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowCounters {
    pub mem_bytes_allocated: u64,
    pub page_faults: u64,
    pub ctx_switches_graceful: u64,
    pub ctx_switches_forced: u64,
    pub fs_read_count: u64,
    pub fs_read_size_kb: u64,
    pub fs_write_count: u64,
    pub fs_write_size_kb: u64,
}

impl WindowCounters {
    /// Metric names in field order, as exposed by the collector
    pub const FIELD_NAMES: [&'static str; 8] = [
        "mem_bytes_allocated",
        "page_faults",
        "ctx_switches_graceful",
        "ctx_switches_forced",
        "fs_read_count",
        "fs_read_size_kb",
        "fs_write_count",
        "fs_write_size_kb",
    ];

    /// Apply the single counter mutation an event maps to.
    ///
    /// Additions saturate so a counter never decreases within its window.
    pub fn apply(&mut self, event: &KernelEvent) {
        match *event {
            KernelEvent::ContextSwitch { prev_state } => {
                if prev_state == tally_common::TASK_RUNNING {
                    self.ctx_switches_forced = self.ctx_switches_forced.saturating_add(1);
                } else {
                    self.ctx_switches_graceful = self.ctx_switches_graceful.saturating_add(1);
                }
            }
            KernelEvent::PageFault => {
                self.page_faults = self.page_faults.saturating_add(1);
            }
            KernelEvent::Alloc { bytes } => {
                self.mem_bytes_allocated = self.mem_bytes_allocated.saturating_add(bytes);
            }
            KernelEvent::FsRead { bytes } => {
                self.fs_read_count = self.fs_read_count.saturating_add(1);
                self.fs_read_size_kb = self.fs_read_size_kb.saturating_add(bytes / BYTES_PER_KB);
            }
            KernelEvent::FsWrite { bytes } => {
                self.fs_write_count = self.fs_write_count.saturating_add(1);
                self.fs_write_size_kb =
                    self.fs_write_size_kb.saturating_add(bytes / BYTES_PER_KB);
            }
        }
    }

    /// `(metric name, value)` pairs in [`Self::FIELD_NAMES`] order
    pub fn fields(&self) -> [(&'static str, u64); 8] {
        let values = [
            self.mem_bytes_allocated,
            self.page_faults,
            self.ctx_switches_graceful,
            self.ctx_switches_forced,
            self.fs_read_count,
            self.fs_read_size_kb,
            self.fs_write_count,
            self.fs_write_size_kb,
        ];
        std::array::from_fn(|i| (Self::FIELD_NAMES[i], values[i]))
    }
}

/// A drained window tagged with the node it came from.
///
/// Serializes flat: `{"node_id": .., "mem_bytes_allocated": .., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    #[serde(flatten)]
    pub counters: WindowCounters,
}

impl NodeSnapshot {
    pub fn new(node_id: impl Into<String>, counters: WindowCounters) -> Self {
        Self {
            node_id: node_id.into(),
            counters,
        }
    }
}
