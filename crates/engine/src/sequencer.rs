// Segment sequencer: maintains a monotonic sequence cursor across
// playlist refreshes and decides which segments are new, stale, or
// duplicate.

use std::collections::{BTreeMap, HashSet, VecDeque};

use hls::{MediaPlaylistInfo, SegmentDescriptor};
use tracing::{debug, info, warn};

/// How many URLs the duplicate-suppression set remembers.
const SEEN_URLS_CAPACITY: usize = 256;

/// Pending entries older than `last_processed - GC_WINDOW` are dropped.
const GC_WINDOW: u64 = 10;

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Re-join the live edge aggressively on discontinuities and cap
    /// catch-up depth.
    pub low_latency: bool,
    /// Maximum segments behind the live edge scheduled while catching
    /// up (low-latency mode only).
    pub max_segments_to_buffer: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            low_latency: false,
            max_segments_to_buffer: 3,
        }
    }
}

/// Result of feeding one playlist refresh through the sequencer.
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// Segments released for download, in strictly ascending sequence order.
    pub released: Vec<SegmentDescriptor>,
    /// The refresh carried a discontinuity; the caller must reset the
    /// TS processor and clear the buffer.
    pub discontinuity: bool,
}

/// Per-stream sequencing state.
///
/// Segments arrive in playlist order but may repeat or back-fill across
/// refreshes; the sequencer anchors a cursor on first sight and only
/// releases strictly ascending, never-before-seen sequences.
#[derive(Debug, Default)]
pub struct SegmentSequencer {
    config: SequencerConfig,
    next_expected: Option<u64>,
    last_processed: Option<u64>,
    pending: BTreeMap<u64, SegmentDescriptor>,
    seen_urls: HashSet<String>,
    seen_order: VecDeque<String>,
}

impl SegmentSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            next_expected: None,
            last_processed: None,
            pending: BTreeMap::new(),
            seen_urls: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// The sequence number the next released segment will carry.
    pub fn next_expected(&self) -> Option<u64> {
        self.next_expected
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed a refreshed playlist through the sequencer.
    pub fn on_refresh(&mut self, playlist: &MediaPlaylistInfo) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();

        if playlist.segments.is_empty() {
            return outcome;
        }

        if playlist.has_discontinuity {
            outcome.discontinuity = true;
            self.reanchor_for_discontinuity(playlist);
        } else if self.next_expected.is_none() {
            let first = playlist.segments[0].sequence;
            self.anchor(first);
            debug!(anchor = first, "sequencer anchored");
        }

        for segment in &playlist.segments {
            self.consider(segment);
        }

        if self.config.low_latency {
            self.enforce_catchup_cap();
        }

        outcome.released = self.release_ready();
        self.garbage_collect();
        outcome
    }

    /// Insert a downloaded-out-of-band segment (used by tests to model
    /// concurrent arrival); release order still follows the cursor.
    pub fn offer(&mut self, segment: SegmentDescriptor) -> Vec<SegmentDescriptor> {
        self.consider(&segment);
        self.release_ready()
    }

    /// Drop all state, as if the stream had just started.
    pub fn reset(&mut self) {
        self.next_expected = None;
        self.last_processed = None;
        self.pending.clear();
        self.seen_urls.clear();
        self.seen_order.clear();
    }

    fn anchor(&mut self, sequence: u64) {
        self.next_expected = Some(sequence);
        self.last_processed = sequence.checked_sub(1);
    }

    fn reanchor_for_discontinuity(&mut self, playlist: &MediaPlaylistInfo) {
        // Low latency rejoins the live edge: everything but the newest
        // segment of the refresh is discarded. Otherwise resume from
        // the first segment after the break.
        let anchor = if self.config.low_latency {
            playlist.segments.last()
        } else {
            playlist
                .segments
                .iter()
                .find(|s| s.discontinuity)
                .or(playlist.segments.last())
        };
        let Some(anchor) = anchor else { return };

        info!(
            anchor = anchor.sequence,
            low_latency = self.config.low_latency,
            "discontinuity: re-anchoring sequencer"
        );
        self.pending.clear();
        self.seen_urls.clear();
        self.seen_order.clear();
        self.anchor(anchor.sequence);
    }

    fn consider(&mut self, segment: &SegmentDescriptor) {
        let url = segment.url.as_str();

        if self.seen_urls.contains(url) {
            return;
        }

        if let Some(lp) = self.last_processed
            && segment.sequence <= lp
        {
            debug!(
                sequence = segment.sequence,
                last_processed = lp,
                "rejecting stale segment"
            );
            self.mark_seen(url);
            return;
        }

        if self.pending.contains_key(&segment.sequence) {
            // Exact duplicates take the first observed.
            warn!(
                sequence = segment.sequence,
                url, "duplicate sequence number with different URL, discarding"
            );
            self.mark_seen(url);
            return;
        }

        self.mark_seen(url);
        self.pending.insert(segment.sequence, segment.clone());
    }

    fn mark_seen(&mut self, url: &str) {
        if self.seen_urls.insert(url.to_string()) {
            self.seen_order.push_back(url.to_string());
            while self.seen_order.len() > SEEN_URLS_CAPACITY {
                if let Some(evicted) = self.seen_order.pop_front() {
                    self.seen_urls.remove(&evicted);
                }
            }
        }
    }

    /// While the smallest pending key equals the cursor, pop and emit.
    fn release_ready(&mut self) -> Vec<SegmentDescriptor> {
        let mut released = Vec::new();
        while let Some(next) = self.next_expected {
            let Some(segment) = self.pending.remove(&next) else {
                break;
            };
            self.last_processed = Some(next);
            self.next_expected = Some(next + 1);
            released.push(segment);
        }
        released
    }

    /// Skip forward so no more than `max_segments_to_buffer` pending
    /// segments sit between the cursor and the live edge.
    fn enforce_catchup_cap(&mut self) {
        let cap = self.config.max_segments_to_buffer.max(1);
        while self.pending.len() > cap {
            if let Some((&oldest, _)) = self.pending.first_key_value() {
                self.pending.remove(&oldest);
                info!(
                    sequence = oldest,
                    "skipping older segment to stay near the live edge"
                );
                self.last_processed = Some(oldest);
                if self.next_expected.is_some_and(|n| n <= oldest) {
                    self.next_expected = Some(oldest + 1);
                }
            }
        }
    }

    fn garbage_collect(&mut self) {
        let Some(lp) = self.last_processed else { return };
        let threshold = lp.saturating_sub(GC_WINDOW);
        let stale: Vec<u64> = self
            .pending
            .range(..threshold)
            .map(|(&seq, _)| seq)
            .collect();
        for seq in stale {
            warn!(sequence = seq, "garbage-collecting stuck pending segment");
            self.pending.remove(&seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn seg(sequence: u64, name: &str) -> SegmentDescriptor {
        SegmentDescriptor {
            url: Url::parse(&format!("https://cdn.example.com/{name}")).unwrap(),
            sequence,
            duration_ms: 6000,
            discontinuity: false,
            ad_boundary: None,
        }
    }

    fn playlist(segments: Vec<SegmentDescriptor>) -> MediaPlaylistInfo {
        let has_discontinuity = segments.iter().any(|s| s.discontinuity);
        let media_sequence_base = segments.first().map(|s| s.sequence).unwrap_or(0);
        MediaPlaylistInfo {
            target_duration_ms: 6000,
            media_sequence_base,
            end_list: false,
            has_discontinuity,
            segments,
        }
    }

    fn sequences(released: &[SegmentDescriptor]) -> Vec<u64> {
        released.iter().map(|s| s.sequence).collect()
    }

    #[test]
    fn test_steady_live_stream() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());

        let out = seq.on_refresh(&playlist(vec![
            seg(100, "seg100.ts"),
            seg(101, "seg101.ts"),
            seg(102, "seg102.ts"),
        ]));
        assert_eq!(sequences(&out.released), vec![100, 101, 102]);

        let out = seq.on_refresh(&playlist(vec![
            seg(103, "seg103.ts"),
            seg(104, "seg104.ts"),
            seg(105, "seg105.ts"),
        ]));
        assert_eq!(sequences(&out.released), vec![103, 104, 105]);
        assert_eq!(seq.next_expected(), Some(106));
    }

    #[test]
    fn test_refresh_with_overlap_releases_only_new() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        let out = seq.on_refresh(&playlist(vec![seg(100, "s100.ts"), seg(101, "s101.ts")]));
        assert_eq!(sequences(&out.released), vec![100, 101]);

        // Same segments plus one new on the next refresh.
        let out = seq.on_refresh(&playlist(vec![
            seg(100, "s100.ts"),
            seg(101, "s101.ts"),
            seg(102, "s102.ts"),
        ]));
        assert_eq!(sequences(&out.released), vec![102]);
    }

    #[test]
    fn test_backfilled_refresh_rejects_stale() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        let out = seq.on_refresh(&playlist(vec![seg(100, "s100.ts"), seg(101, "s101.ts")]));
        assert_eq!(sequences(&out.released), vec![100, 101]);

        // Backfill: 99 appears after we anchored at 100.
        let out = seq.on_refresh(&playlist(vec![
            seg(99, "s99.ts"),
            seg(100, "s100.ts"),
            seg(101, "s101.ts"),
            seg(102, "s102.ts"),
        ]));
        assert_eq!(sequences(&out.released), vec![102]);
        assert_eq!(seq.next_expected(), Some(103));
    }

    #[test]
    fn test_out_of_order_offer_is_held_back() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        seq.on_refresh(&playlist(vec![seg(100, "s100.ts")]));

        // 102 arrives before 101: held in the pending map.
        let released = seq.offer(seg(102, "s102.ts"));
        assert!(released.is_empty());
        assert_eq!(seq.pending_len(), 1);

        // 101 unblocks both, in order.
        let released = seq.offer(seg(101, "s101.ts"));
        assert_eq!(sequences(&released), vec![101, 102]);
    }

    #[test]
    fn test_single_segment_playlist_is_ingested_once() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        let pl = playlist(vec![seg(7, "only.ts")]);
        let out = seq.on_refresh(&pl);
        assert_eq!(sequences(&out.released), vec![7]);

        // Unchanged refreshes never re-release it.
        for _ in 0..3 {
            let out = seq.on_refresh(&pl);
            assert!(out.released.is_empty());
        }
    }

    #[test]
    fn test_discontinuity_reanchors_at_live_edge_in_low_latency() {
        let mut seq = SegmentSequencer::new(SequencerConfig {
            low_latency: true,
            max_segments_to_buffer: 3,
        });
        seq.on_refresh(&playlist(vec![seg(198, "s198.ts"), seg(199, "s199.ts")]));

        let mut disc = seg(202, "s202.ts");
        disc.discontinuity = true;
        let out = seq.on_refresh(&playlist(vec![seg(200, "s200.ts"), seg(201, "s201.ts"), disc]));
        assert!(out.discontinuity);
        // Only the final segment of the refresh survives.
        assert_eq!(sequences(&out.released), vec![202]);
        assert_eq!(seq.next_expected(), Some(203));
    }

    #[test]
    fn test_discontinuity_resumes_from_break_in_standard_mode() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        seq.on_refresh(&playlist(vec![seg(199, "s199.ts")]));

        let mut disc = seg(201, "s201.ts");
        disc.discontinuity = true;
        let out = seq.on_refresh(&playlist(vec![
            seg(200, "s200.ts"),
            disc,
            seg(202, "s202.ts"),
        ]));
        assert!(out.discontinuity);
        assert_eq!(sequences(&out.released), vec![201, 202]);
    }

    #[test]
    fn test_duplicate_sequence_takes_first_observed() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        seq.on_refresh(&playlist(vec![seg(10, "a.ts")]));

        // 12 arrives twice with different URLs while 11 is missing.
        assert!(seq.offer(seg(12, "first.ts")).is_empty());
        assert!(seq.offer(seg(12, "second.ts")).is_empty());
        assert_eq!(seq.pending_len(), 1);

        // When 11 unblocks the cursor, the first-observed URL wins.
        let released = seq.offer(seg(11, "s11.ts"));
        assert_eq!(sequences(&released), vec![11, 12]);
        assert!(released[1].url.as_str().ends_with("first.ts"));
    }

    #[test]
    fn test_catchup_cap_skips_old_segments() {
        let mut seq = SegmentSequencer::new(SequencerConfig {
            low_latency: true,
            max_segments_to_buffer: 2,
        });
        // Anchor, then a burst of 6 pending segments appears at once,
        // with the first two missing so nothing releases immediately.
        seq.on_refresh(&playlist(vec![seg(0, "s0.ts")]));
        let out = seq.on_refresh(&playlist(vec![
            seg(3, "s3.ts"),
            seg(4, "s4.ts"),
            seg(5, "s5.ts"),
            seg(6, "s6.ts"),
        ]));
        // Cap 2: oldest pendings are skipped, the newest 2 release once
        // the cursor lands on them.
        assert_eq!(sequences(&out.released), vec![5, 6]);
    }

    #[test]
    fn test_seen_url_suppression_across_refreshes() {
        let mut seq = SegmentSequencer::new(SequencerConfig::default());
        seq.on_refresh(&playlist(vec![seg(100, "s100.ts")]));
        // The same URL under a bumped sequence number is still a repeat.
        let out = seq.on_refresh(&playlist(vec![seg(101, "s100.ts")]));
        assert!(out.released.is_empty());
    }
}
