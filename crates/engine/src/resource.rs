// Process-wide resource coordinator: tracks active streams and
// recommends per-stream resource sizing so concurrent streams do not
// starve each other. Passed explicitly to each stream at start; there
// is no global instance.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Registry {
    active: usize,
    total_created: u64,
}

/// Shared registry of active streams with sizing recommendations.
#[derive(Debug, Default)]
pub struct ResourceCoordinator {
    registry: Mutex<Registry>,
}

impl ResourceCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new stream; the returned slot deregisters on drop.
    pub fn register(self: &Arc<Self>) -> StreamSlot {
        let mut registry = self.registry.lock();
        registry.active += 1;
        registry.total_created += 1;
        debug!(active = registry.active, "stream registered");
        StreamSlot {
            coordinator: Arc::clone(self),
        }
    }

    pub fn active_streams(&self) -> usize {
        self.registry.lock().active
    }

    pub fn total_streams_created(&self) -> u64 {
        self.registry.lock().total_created
    }

    /// Pipe buffering for the player: larger under multi-stream
    /// contention to reduce frame-drop risk.
    pub fn recommended_pipe_buffer(&self) -> usize {
        match self.active_streams() {
            0 | 1 => 256 * 1024,
            2 | 3 => 512 * 1024,
            _ => 1024 * 1024,
        }
    }

    /// Startup stagger so concurrent streams do not hit the origin with
    /// a thundering herd of playlist requests.
    pub fn recommended_start_delay(&self) -> Duration {
        // The stream asking has already registered itself.
        match self.active_streams().saturating_sub(1) {
            0 => Duration::from_millis(50),
            1 => Duration::from_millis(500),
            2 => Duration::from_millis(1000),
            n => Duration::from_millis(1000 + (n as u64 - 2) * 500),
        }
    }

    /// TS buffer capacity scaled with concurrency, capped so one stream
    /// cannot grow without bound.
    pub fn recommended_buffer_packets(&self, base: usize) -> usize {
        let active = self.active_streams().max(1);
        (base + (active - 1) * 5_000).min(35_000.max(base))
    }
}

/// RAII registration for one stream.
#[derive(Debug)]
pub struct StreamSlot {
    coordinator: Arc<ResourceCoordinator>,
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        let mut registry = self.coordinator.registry.lock();
        registry.active = registry.active.saturating_sub(1);
        debug!(active = registry.active, "stream deregistered");
    }
}
