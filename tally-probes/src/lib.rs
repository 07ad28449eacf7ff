//! eBPF probes for tally
//!
//! Kernel-side programs that turn scheduler, memory and VFS activity into
//! `RawEvent` records on the per-CPU `EVENTS` perf array. The programs live in
//! `src/bin/`.

#![cfg_attr(not(test), no_std)]

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
