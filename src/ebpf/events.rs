use super::EventKind;
use crate::TallyError;
use tally_common::{kind, RawEvent};

/// Typed kernel event as seen by the ingestor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelEvent {
    ContextSwitch { prev_state: u64 },
    PageFault,
    Alloc { bytes: u64 },
    FsRead { bytes: u64 },
    FsWrite { bytes: u64 },
}

impl KernelEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            KernelEvent::ContextSwitch { .. } => EventKind::ContextSwitch,
            KernelEvent::PageFault => EventKind::PageFault,
            KernelEvent::Alloc { .. } => EventKind::Alloc,
            KernelEvent::FsRead { .. } => EventKind::FsRead,
            KernelEvent::FsWrite { .. } => EventKind::FsWrite,
        }
    }
}

impl TryFrom<&RawEvent> for KernelEvent {
    type Error = TallyError;

    fn try_from(raw: &RawEvent) -> Result<Self, Self::Error> {
        let event = match raw.kind {
            kind::CONTEXT_SWITCH => KernelEvent::ContextSwitch {
                prev_state: raw.value,
            },
            kind::PAGE_FAULT => KernelEvent::PageFault,
            kind::ALLOC => KernelEvent::Alloc { bytes: raw.value },
            kind::FS_READ => KernelEvent::FsRead { bytes: raw.value },
            kind::FS_WRITE => KernelEvent::FsWrite { bytes: raw.value },
            other => return Err(TallyError::UnknownEventKind { kind: other }),
        };
        Ok(event)
    }
}

/// Decode a probe record read from a perf buffer.
///
/// Perf samples are padded to 8-byte alignment, so trailing bytes past the
/// record are ignored. Returns `None` when the buffer is too short.
pub fn decode_raw(bytes: &[u8]) -> Option<RawEvent> {
    if bytes.len() < std::mem::size_of::<RawEvent>() {
        return None;
    }
    // SAFETY: length checked above and RawEvent is a plain #[repr(C)] record of integers
    Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const RawEvent) })
}
