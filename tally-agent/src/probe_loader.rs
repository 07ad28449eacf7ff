//! eBPF probe loader and per-CPU event readers

use anyhow::{anyhow, Context, Result};
use aya::maps::perf::AsyncPerfEventArray;
use aya::maps::MapData;
use aya::programs::{KProbe, TracePoint};
use aya::util::online_cpus;
use aya::Ebpf;
use bytes::BytesMut;
use std::path::Path;
use std::sync::Arc;
use tally::aggregate::EventIngestor;
use tally::ebpf::events::decode_raw;
use tally::ebpf::{Attach, ProbeSpec, EVENTS_MAP, PROBES};
use tally::metrics::PipelineMetrics;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Buffers handed to each `read_events` call
const READ_BATCH: usize = 16;
const SAMPLE_CAPACITY: usize = 64;

/// Owns the loaded probe object; programs stay attached while it lives
pub struct ProbeManager {
    bpf: Ebpf,
}

impl ProbeManager {
    /// Run pre-flight checks and load the probe object embedded at build time
    pub fn new() -> Result<Self> {
        run_preflight_checks()?;

        info!("Loading kernel probes...");
        let bpf = Ebpf::load(aya::include_bytes_aligned!(concat!(
            env!("OUT_DIR"),
            "/tally_probes"
        )))
        .context("Failed to load eBPF program")?;

        Ok(Self { bpf })
    }

    pub fn attach_all(&mut self) -> Result<()> {
        for spec in &PROBES {
            self.attach(spec)
                .with_context(|| format!("attaching {}", spec.program))?;
        }
        info!("Attached {} probes", PROBES.len());
        Ok(())
    }

    fn attach(&mut self, spec: &ProbeSpec) -> Result<()> {
        let program = self
            .bpf
            .program_mut(spec.program)
            .ok_or_else(|| anyhow!("{} program not found in eBPF object", spec.program))?;

        match spec.attach {
            Attach::Tracepoint { category, name } => {
                let program: &mut TracePoint = program.try_into()?;
                program.load()?;
                program.attach(category, name)?;
                info!("{} attached to tracepoint {}/{}", spec.program, category, name);
            }
            Attach::Kprobe { function } => {
                let program: &mut KProbe = program.try_into()?;
                program.load()?;
                program.attach(function, 0)?;
                info!("{} attached to kprobe {}", spec.program, function);
            }
        }
        Ok(())
    }

    /// Start one reader task per online CPU, each feeding `ingestor`
    pub fn spawn_readers(
        &mut self,
        ingestor: EventIngestor,
        metrics: Arc<PipelineMetrics>,
        cancel: CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>> {
        let available_maps: Vec<_> = self.bpf.maps().map(|(name, _)| name.to_string()).collect();
        let map = self.bpf.take_map(EVENTS_MAP).ok_or_else(|| {
            anyhow!(
                "{} map not found in eBPF object. Available maps: {:?}",
                EVENTS_MAP,
                available_maps
            )
        })?;
        let mut events = AsyncPerfEventArray::try_from(map)
            .context("Failed to create AsyncPerfEventArray from EVENTS map")?;

        let cpus = online_cpus().map_err(|(path, e)| anyhow!("reading {}: {}", path, e))?;
        let mut handles = Vec::with_capacity(cpus.len());

        for cpu in cpus {
            let buffer = events
                .open(cpu, None)
                .with_context(|| format!("opening perf buffer for CPU {}", cpu))?;
            handles.push(tokio::spawn(read_cpu(
                cpu,
                buffer,
                ingestor.clone(),
                metrics.clone(),
                cancel.clone(),
            )));
        }

        info!("Reading events from {} CPUs", handles.len());
        Ok(handles)
    }

    /// Detach and unload all probes
    pub fn unload(self) {
        info!("Unloading eBPF probes...");
        drop(self.bpf);
        info!("Probes unloaded");
    }
}

async fn read_cpu(
    cpu: u32,
    mut buffer: aya::maps::perf::AsyncPerfEventArrayBuffer<MapData>,
    ingestor: EventIngestor,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    let mut buffers = (0..READ_BATCH)
        .map(|_| BytesMut::with_capacity(SAMPLE_CAPACITY))
        .collect::<Vec<_>>();

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = buffer.read_events(&mut buffers) => batch,
        };

        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                error!("Perf buffer read failed on CPU {}: {}", cpu, e);
                break;
            }
        };

        if batch.lost > 0 {
            metrics.events_lost.inc_by(batch.lost as u64);
            warn!("CPU {} lost {} samples", cpu, batch.lost);
        }

        for sample in buffers.iter().take(batch.read) {
            let Some(raw) = decode_raw(sample) else {
                metrics.events_dropped.inc();
                warn!("Malformed sample of {} bytes on CPU {}", sample.len(), cpu);
                continue;
            };
            if let Err(e) = ingestor.ingest_raw(&raw) {
                debug!("Skipping sample on CPU {}: {}", cpu, e);
            }
        }
    }

    debug!("Reader for CPU {} stopped", cpu);
}

/// Run pre-flight checks to validate the system can run eBPF programs
fn run_preflight_checks() -> Result<()> {
    info!("Running pre-flight checks...");

    check_kernel_version()?;
    check_btf();
    check_privileges();

    info!("Pre-flight checks passed");
    Ok(())
}

fn check_kernel_version() -> Result<()> {
    let release = std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .context("Failed to read kernel release")?;
    let release = release.trim();

    let (major, minor) = parse_kernel_release(release)
        .ok_or_else(|| anyhow!("Could not parse kernel version: {}", release))?;

    if (major, minor) < (5, 8) {
        return Err(anyhow!(
            "Kernel {} is too old. The probes require kernel 5.8+",
            release
        ));
    }

    info!("Kernel version: {} (supported)", release);
    Ok(())
}

fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split(['.', '-']);
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}

fn check_btf() {
    if Path::new("/sys/kernel/btf/vmlinux").exists() {
        info!("BTF available");
    } else {
        warn!("BTF not found at /sys/kernel/btf/vmlinux; tracepoint field offsets may not match");
    }
}

fn check_privileges() {
    // SAFETY: geteuid has no preconditions
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        warn!(
            "Not running as root (euid={}). Ensure CAP_BPF and CAP_PERFMON are granted.",
            euid
        );
    } else {
        info!("Running with root privileges");
    }
}
