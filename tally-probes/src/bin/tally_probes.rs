//! Scheduler, memory and VFS probes
//!
//! Every program emits one `RawEvent` per hit into `EVENTS`; all counting
//! happens in userspace.
//!
//! Note: This binary must be built for the bpfel-unknown-none target. Build it
//! through tally-agent's `ebpf` feature, whose build.rs cross-compiles it.

#![no_std]
#![no_main]

use aya_ebpf::{
    helpers::bpf_ktime_get_ns,
    macros::{kprobe, map, tracepoint},
    maps::PerfEventArray,
    programs::{ProbeContext, TracePointContext},
    EbpfContext,
};
use tally_common::{kind, RawEvent};

/// Offset of `prev_state` in the sched/sched_switch record
/// (see /sys/kernel/tracing/events/sched/sched_switch/format)
const SCHED_SWITCH_PREV_STATE: usize = 32;

#[map]
static EVENTS: PerfEventArray<RawEvent> = PerfEventArray::new(0);

#[inline(always)]
fn emit<C: EbpfContext>(ctx: &C, kind: u32, value: u64) {
    // SAFETY: bpf_ktime_get_ns is always safe to call from eBPF context
    let timestamp_ns = unsafe { bpf_ktime_get_ns() };
    EVENTS.output(ctx, &RawEvent::new(kind, timestamp_ns, value), 0);
}

#[tracepoint]
pub fn trace_ctx_switches(ctx: TracePointContext) -> u32 {
    // SAFETY: offset taken from the tracepoint format, read is bounds-checked by the verifier
    match unsafe { ctx.read_at::<i64>(SCHED_SWITCH_PREV_STATE) } {
        Ok(prev_state) => emit(&ctx, kind::CONTEXT_SWITCH, prev_state as u64),
        Err(_) => return 1,
    }
    0
}

#[kprobe]
pub fn trace_page_faults(ctx: ProbeContext) -> u32 {
    emit(&ctx, kind::PAGE_FAULT, 0);
    0
}

/// `__kmalloc(size_t size, gfp_t flags)`
#[kprobe]
pub fn trace_memory_allocation(ctx: ProbeContext) -> u32 {
    let size: u64 = ctx.arg(0).unwrap_or(0);
    emit(&ctx, kind::ALLOC, size);
    0
}

/// `vfs_read(struct file *, char __user *, size_t count, loff_t *)`
#[kprobe]
pub fn trace_fs_read(ctx: ProbeContext) -> u32 {
    let count: u64 = ctx.arg(2).unwrap_or(0);
    emit(&ctx, kind::FS_READ, count);
    0
}

/// `vfs_write(struct file *, const char __user *, size_t count, loff_t *)`
#[kprobe]
pub fn trace_fs_write(ctx: ProbeContext) -> u32 {
    let count: u64 = ctx.arg(2).unwrap_or(0);
    emit(&ctx, kind::FS_WRITE, count);
    0
}

#[cfg(not(test))]
#[cfg(target_arch = "bpf")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
