// PID filter: allow/block/auto-detect policy plus a discontinuity gate
// applied to each tagged packet before it enters the TS buffer.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};
use ts::{PidCategory, TaggedPacket};

/// PID filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Only allow explicitly listed PIDs.
    AllowList,
    /// Block listed PIDs (and auto-detected ones), pass the rest.
    BlockList,
    /// Pass everything except PIDs auto-detected as problematic.
    #[default]
    AutoDetect,
}

/// What to do with packets that carry a discontinuity indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscontinuityMode {
    /// Pass all packets through.
    #[default]
    PassThrough,
    /// Drop packets with the discontinuity flag.
    FilterOut,
    /// Pass but log each one.
    LogOnly,
    /// Keep essential PIDs (PAT, PMT, video, audio), drop the rest.
    Smart,
}

#[derive(Debug, Clone)]
pub struct PidFilterConfig {
    pub mode: FilterMode,
    pub discontinuity_mode: DiscontinuityMode,
    pub allowed: HashSet<u16>,
    pub blocked: HashSet<u16>,
    /// Discontinuity rate above which a PID is auto-blocked.
    pub auto_detect_threshold: f64,
    /// Packets observed on a PID before auto-detection kicks in.
    pub auto_detect_min_packets: u64,
}

impl Default for PidFilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::default(),
            discontinuity_mode: DiscontinuityMode::default(),
            allowed: HashSet::new(),
            blocked: HashSet::new(),
            auto_detect_threshold: 0.1,
            auto_detect_min_packets: 100,
        }
    }
}

/// Per-PID statistics kept for diagnostics.
#[derive(Debug, Clone)]
pub struct PidStats {
    pub category: PidCategory,
    pub packets: u64,
    pub discontinuities: u64,
    pub errors: u64,
    pub continuity_error: bool,
    first_seen: Instant,
}

impl PidStats {
    fn new(category: PidCategory) -> Self {
        Self {
            category,
            packets: 0,
            discontinuities: 0,
            errors: 0,
            continuity_error: false,
            first_seen: Instant::now(),
        }
    }

    pub fn packets_per_second(&self) -> f64 {
        let elapsed = self.first_seen.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.packets as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn discontinuity_rate(&self) -> f64 {
        if self.packets > 0 {
            self.discontinuities as f64 / self.packets as f64
        } else {
            0.0
        }
    }
}

/// Stateful per-stream PID filter.
#[derive(Debug)]
pub struct PidFilter {
    config: PidFilterConfig,
    auto_blocked: HashSet<u16>,
    stats: HashMap<u16, PidStats>,
    total_packets: u64,
    total_dropped: u64,
}

impl PidFilter {
    pub fn new(config: PidFilterConfig) -> Self {
        Self {
            config,
            auto_blocked: HashSet::new(),
            stats: HashMap::new(),
            total_packets: 0,
            total_dropped: 0,
        }
    }

    pub fn stats(&self) -> &HashMap<u16, PidStats> {
        &self.stats
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    pub fn auto_blocked(&self) -> &HashSet<u16> {
        &self.auto_blocked
    }

    /// PIDs whose discontinuity rate currently exceeds the threshold.
    pub fn problematic_pids(&self) -> Vec<u16> {
        self.stats
            .iter()
            .filter(|(_, s)| s.discontinuity_rate() > self.config.auto_detect_threshold)
            .map(|(&pid, _)| pid)
            .collect()
    }

    /// Clear statistics and auto-detection state (after a discontinuity
    /// reset the old rates no longer describe the stream).
    pub fn reset(&mut self) {
        self.auto_blocked.clear();
        self.stats.clear();
    }

    /// Decide whether one packet passes, updating statistics.
    pub fn should_pass(&mut self, packet: &TaggedPacket) -> bool {
        self.total_packets += 1;
        let pid = packet.packet.pid;

        self.update_stats(packet);
        if self.config.mode != FilterMode::AllowList {
            self.check_auto_detection(pid);
        }

        let mode_pass = match self.config.mode {
            FilterMode::AllowList => self.config.allowed.contains(&pid),
            FilterMode::BlockList => {
                !self.config.blocked.contains(&pid) && !self.auto_blocked.contains(&pid)
            }
            FilterMode::AutoDetect => !self.auto_blocked.contains(&pid),
        };

        if !mode_pass {
            self.total_dropped += 1;
            return false;
        }

        if packet.discontinuity {
            let disc_pass = match self.config.discontinuity_mode {
                DiscontinuityMode::PassThrough => true,
                DiscontinuityMode::FilterOut => false,
                DiscontinuityMode::LogOnly => {
                    info!(pid, "discontinuity indicator on passing packet");
                    true
                }
                DiscontinuityMode::Smart => packet.category.is_essential(),
            };
            if !disc_pass {
                debug!(pid, category = ?packet.category, "dropping discontinuity packet");
                self.total_dropped += 1;
                return false;
            }
        }

        true
    }

    /// Apply the filter to a whole segment's worth of packets.
    pub fn filter(&mut self, packets: Vec<TaggedPacket>) -> Vec<TaggedPacket> {
        packets.into_iter().filter(|p| self.should_pass(p)).collect()
    }

    fn update_stats(&mut self, packet: &TaggedPacket) {
        let stats = self
            .stats
            .entry(packet.packet.pid)
            .or_insert_with(|| PidStats::new(packet.category));
        // Category can refine later (e.g. Unknown until the PES header shows up).
        if stats.category == PidCategory::Unknown && packet.category != PidCategory::Unknown {
            stats.category = packet.category;
        }
        stats.packets += 1;
        if packet.discontinuity {
            stats.discontinuities += 1;
        }
        if packet.continuity.is_error() {
            stats.errors += 1;
            stats.continuity_error = true;
        }
    }

    fn check_auto_detection(&mut self, pid: u16) {
        if self.auto_blocked.contains(&pid) {
            return;
        }
        let Some(stats) = self.stats.get(&pid) else {
            return;
        };
        if stats.packets >= self.config.auto_detect_min_packets
            && stats.discontinuity_rate() > self.config.auto_detect_threshold
        {
            // Never auto-block essential PIDs; losing PAT or video is
            // worse than any discontinuity noise.
            if stats.category.is_essential() {
                return;
            }
            warn!(
                pid,
                rate = stats.discontinuity_rate(),
                "auto-blocking problematic PID"
            );
            self.auto_blocked.insert(pid);
        }
    }
}
