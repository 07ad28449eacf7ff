//! Shared types between eBPF (kernel) and userspace
//!
//! This crate defines the event record that must be:
//! - `#[repr(C)]` for stable memory layout
//! - `no_std` compatible for eBPF
//! - Shared between kernel probes and the userspace agent

#![cfg_attr(not(feature = "userspace"), no_std)]

/// Kernel event emitted by a probe into the per-CPU `EVENTS` perf array
///
/// Layout (24 bytes total, 8-byte aligned):
/// - timestamp_ns: Kernel monotonic timestamp (`bpf_ktime_get_ns`)
/// - value: Kind-specific payload (see [`kind`])
/// - kind: Event kind discriminant
/// - _padding: Keeps the record a multiple of 8 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "userspace", derive(PartialEq, Eq))]
pub struct RawEvent {
    pub timestamp_ns: u64,
    pub value: u64,
    pub kind: u32,
    pub _padding: u32,
}

impl RawEvent {
    pub const fn new(kind: u32, timestamp_ns: u64, value: u64) -> Self {
        Self {
            timestamp_ns,
            value,
            kind,
            _padding: 0,
        }
    }
}

/// Event kind discriminants and the meaning of `RawEvent::value` for each
pub mod kind {
    /// Scheduler switch; value = previous task state
    pub const CONTEXT_SWITCH: u32 = 1;
    /// Page fault; value unused
    pub const PAGE_FAULT: u32 = 2;
    /// Kernel allocation; value = requested bytes
    pub const ALLOC: u32 = 3;
    /// VFS read; value = requested byte count
    pub const FS_READ: u32 = 4;
    /// VFS write; value = requested byte count
    pub const FS_WRITE: u32 = 5;
}

/// `TASK_RUNNING` from `linux/sched.h`
pub const TASK_RUNNING: u64 = 0;

#[cfg(feature = "userspace")]
const _: () = {
    assert!(
        core::mem::size_of::<RawEvent>() == 24,
        "RawEvent must be exactly 24 bytes"
    );
    assert!(
        core::mem::align_of::<RawEvent>() == 8,
        "RawEvent must be 8-byte aligned"
    );
};
