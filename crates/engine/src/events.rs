use hls::AdBoundary;
use parking_lot::Mutex;

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The origin marked the playlist VOD-complete and the buffer drained.
    Completed,
    /// The cancel token was set by the user or a supervisor.
    Cancelled,
    /// The player process exited.
    PlayerExited { code: Option<i32> },
    /// A pipe write failed or came up short.
    PipeBroken,
    /// The consecutive refresh-failure cap was exceeded.
    SourceFailed { consecutive_failures: u32 },
}

impl StopReason {
    /// Normal completion versus failed-or-interrupted.
    pub fn is_normal(&self) -> bool {
        matches!(self, StopReason::Completed)
    }
}

/// Events surfaced to the consumer of a stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    PlaylistRefreshed {
        media_sequence_base: u64,
        target_duration_ms: u64,
        new_segments: usize,
    },
    Discontinuity {
        sequence: u64,
    },
    AdBoundary {
        sequence: u64,
        boundary: AdBoundary,
    },
    SegmentIngested {
        sequence: u64,
        packets: usize,
    },
    StreamEnded {
        reason: StopReason,
    },
}

/// First-writer-wins slot for the stream's stop reason.
///
/// Any task that terminates the stream records why; later writers
/// (e.g. the cancellation that fans out afterwards) do not overwrite
/// the original cause.
#[derive(Debug, Default)]
pub struct StopSlot(Mutex<Option<StopReason>>);

impl StopSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reason; returns false if one was already recorded.
    pub fn set(&self, reason: StopReason) -> bool {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(reason);
            true
        } else {
            false
        }
    }

    pub fn get(&self) -> Option<StopReason> {
        *self.0.lock()
    }
}
