// Bounded FIFO of filtered TS packets between the ingester and the
// pipe writer, with drop-oldest overflow and occupancy watermarks.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};
use ts::TaggedPacket;

/// How many packets a low-latency overflow sweep removes at once.
const LOW_LATENCY_DROP_BATCH: usize = 10;

/// Result of a pop with timeout.
#[derive(Debug)]
pub enum Popped {
    Packet(Box<TaggedPacket>),
    /// Timed out with the queue empty but the producer still active.
    Empty,
    /// Producer signalled end-of-stream and the queue drained.
    Closed,
}

/// Occupancy thresholds driving ingester back-pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub high: usize,
    pub low: usize,
}

impl Watermarks {
    /// Standard mode favours buffering: 90% high / 25% low.
    pub fn standard(capacity: usize) -> Self {
        Self {
            high: capacity * 9 / 10,
            low: capacity / 4,
        }
    }

    /// Low latency favours freshness: 60% high / 12.5% low.
    pub fn low_latency(capacity: usize) -> Self {
        Self {
            high: capacity * 6 / 10,
            low: capacity / 8,
        }
    }

    /// Immediately after a discontinuity playback restart beats
    /// buffering: 12.5% high / 6.25% low.
    pub fn recovery(capacity: usize) -> Self {
        Self {
            high: capacity / 8,
            low: capacity / 16,
        }
    }

    pub fn for_mode(capacity: usize, low_latency: bool, recovering: bool) -> Self {
        if recovering {
            Self::recovery(capacity)
        } else if low_latency {
            Self::low_latency(capacity)
        } else {
            Self::standard(capacity)
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<TaggedPacket>,
    open: bool,
    dropped_overflow: u64,
}

/// Bounded packet FIFO. The mutex is the only cross-task lock on the
/// hot path and is held only for the duration of a push or pop.
#[derive(Debug)]
pub struct TsBuffer {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
    low_latency: bool,
}

impl TsBuffer {
    pub fn new(capacity: usize, low_latency: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.min(4096)),
                open: true,
                dropped_overflow: 0,
            }),
            notify: Notify::new(),
            capacity,
            low_latency,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Packets discarded by the overflow policy so far.
    pub fn dropped_overflow(&self) -> u64 {
        self.inner.lock().dropped_overflow
    }

    pub fn is_closed(&self) -> bool {
        !self.inner.lock().open
    }

    /// Push a packet, applying the overflow policy. Returns how many
    /// old packets were dropped to make room.
    pub fn push(&self, packet: TaggedPacket) -> usize {
        let dropped = {
            let mut inner = self.inner.lock();
            if !inner.open {
                return 0;
            }

            let mut dropped = 0usize;
            if self.low_latency && inner.queue.len() >= self.capacity / 2 {
                // Drop a batch of the oldest packets at once so pushes
                // don't thrash at the halfway mark.
                let batch = (inner.queue.len() / 4).min(LOW_LATENCY_DROP_BATCH).max(1);
                for _ in 0..batch {
                    if inner.queue.pop_front().is_none() {
                        break;
                    }
                    dropped += 1;
                }
            } else if inner.queue.len() >= self.capacity {
                inner.queue.pop_front();
                dropped = 1;
            }

            inner.queue.push_back(packet);
            inner.dropped_overflow += dropped as u64;
            dropped
        };

        if dropped > 0 {
            trace!(dropped, "buffer overflow, dropped oldest packets");
        }
        self.notify.notify_one();
        dropped
    }

    /// Pop the next packet, waiting up to `timeout` for one to arrive.
    pub async fn pop(&self, timeout: std::time::Duration) -> Popped {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(packet) = inner.queue.pop_front() {
                    return Popped::Packet(Box::new(packet));
                }
                if !inner.open {
                    return Popped::Closed;
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Popped::Empty;
            }
        }
    }

    /// Drop all queued packets (discontinuity recovery).
    pub fn clear(&self) {
        let cleared = {
            let mut inner = self.inner.lock();
            let n = inner.queue.len();
            inner.queue.clear();
            n
        };
        if cleared > 0 {
            debug!(cleared, "buffer cleared");
        }
        self.notify.notify_waiters();
    }

    /// Signal end-of-stream: consumers drain the queue, then see
    /// [`Popped::Closed`].
    pub fn close(&self) {
        self.inner.lock().open = false;
        self.notify.notify_waiters();
    }
}
