pub mod events;

/// Kernel event categories counted by the profiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContextSwitch,
    PageFault,
    Alloc,
    FsRead,
    FsWrite,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::ContextSwitch,
        EventKind::PageFault,
        EventKind::Alloc,
        EventKind::FsRead,
        EventKind::FsWrite,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::ContextSwitch => "context_switch",
            EventKind::PageFault => "page_fault",
            EventKind::Alloc => "alloc",
            EventKind::FsRead => "fs_read",
            EventKind::FsWrite => "fs_write",
        }
    }

    pub const fn index(&self) -> usize {
        match self {
            EventKind::ContextSwitch => 0,
            EventKind::PageFault => 1,
            EventKind::Alloc => 2,
            EventKind::FsRead => 3,
            EventKind::FsWrite => 4,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a probe program hooks into the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// kprobe on a kernel function
    Kprobe { function: &'static str },
    /// static tracepoint `category/name`
    Tracepoint {
        category: &'static str,
        name: &'static str,
    },
}

/// A program in the probe object and where it attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSpec {
    pub program: &'static str,
    pub kind: EventKind,
    pub attach: Attach,
}

/// Every program the agent loads, in attach order
pub const PROBES: [ProbeSpec; 5] = [
    ProbeSpec {
        program: "trace_ctx_switches",
        kind: EventKind::ContextSwitch,
        attach: Attach::Tracepoint {
            category: "sched",
            name: "sched_switch",
        },
    },
    ProbeSpec {
        program: "trace_page_faults",
        kind: EventKind::PageFault,
        attach: Attach::Kprobe {
            function: "handle_mm_fault",
        },
    },
    ProbeSpec {
        program: "trace_memory_allocation",
        kind: EventKind::Alloc,
        attach: Attach::Kprobe {
            function: "__kmalloc",
        },
    },
    ProbeSpec {
        program: "trace_fs_read",
        kind: EventKind::FsRead,
        attach: Attach::Kprobe {
            function: "vfs_read",
        },
    },
    ProbeSpec {
        program: "trace_fs_write",
        kind: EventKind::FsWrite,
        attach: Attach::Kprobe {
            function: "vfs_write",
        },
    },
];

/// Name of the per-CPU perf event array the probes write to
pub const EVENTS_MAP: &str = "EVENTS";
