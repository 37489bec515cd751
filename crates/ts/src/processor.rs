use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use bytes::Bytes;
use memchr::memchr_iter;
use tracing::{debug, trace, warn};

use crate::packet::{ContinuityStatus, PACKET_SIZE, PID_NULL, PID_PAT, SYNC_BYTE, TsPacket};
use crate::pid::PidCategory;

/// Frame-boundary tag attached to payload-unit-start packets on a video PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTag {
    /// Monotonic frame number across the stream lifetime (resets on discontinuity).
    pub global: u64,
    /// Frame number within the current segment run.
    pub segment_local: u64,
    /// Whether the frame looks like a key frame (MPEG-2 I-frame or H.264 IDR).
    pub key_frame: bool,
    /// Wall-clock estimate of the previous frame's duration, for diagnostics only.
    pub duration: Option<Duration>,
}

/// A parsed TS packet together with everything the pipeline derived about it.
#[derive(Debug, Clone)]
pub struct TaggedPacket {
    pub packet: TsPacket,
    pub category: PidCategory,
    pub continuity: ContinuityStatus,
    /// Discontinuity indicator from the adaptation field.
    pub discontinuity: bool,
    /// Frame tag, present only on payload-unit-start video packets.
    pub frame: Option<FrameTag>,
    /// False while a video PID is recovering from a continuity gap and
    /// has not yet shown a key frame.
    pub sync_valid: bool,
}

/// Per-PID continuity counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidCounters {
    pub packets: u64,
    pub duplicates: u64,
    pub errors: u64,
    pub gaps: u64,
}

/// Aggregate processor statistics.
#[derive(Debug, Clone, Default)]
pub struct ProcessorStats {
    pub segments_processed: u64,
    pub segments_skipped: u64,
    pub packets_emitted: u64,
    pub frames_tagged: u64,
    pub pids: HashMap<u16, PidCounters>,
}

impl ProcessorStats {
    pub fn continuity_errors(&self) -> u64 {
        self.pids.values().map(|c| c.errors + c.gaps).sum()
    }
}

/// Stateful processor that turns downloaded segment bytes into tagged
/// TS packets.
///
/// State spans segments within one continuity region: PID
/// classification, continuity counters, and frame numbering all carry
/// across segments until [`SegmentProcessor::reset`] is called on a
/// playlist discontinuity.
#[derive(Debug, Default)]
pub struct SegmentProcessor {
    video_pids: HashSet<u16>,
    audio_pids: HashSet<u16>,
    pmt_pids: HashSet<u16>,
    last_cc: HashMap<u16, u8>,
    /// Video PIDs that hit a continuity gap and wait for a key frame.
    awaiting_sync: HashSet<u16>,
    global_frame: u64,
    segment_frame: u64,
    last_frame_at: Option<Instant>,
    estimated_frame_duration: Option<Duration>,
    stats: ProcessorStats,
}

impl SegmentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all per-region state. Called after a playlist discontinuity
    /// so frame numbering and PID tracking restart cleanly.
    pub fn reset(&mut self) {
        self.video_pids.clear();
        self.audio_pids.clear();
        self.pmt_pids.clear();
        self.last_cc.clear();
        self.awaiting_sync.clear();
        self.global_frame = 0;
        self.segment_frame = 0;
        self.last_frame_at = None;
        self.estimated_frame_duration = None;
        debug!("segment processor state reset");
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// Known video PIDs detected so far.
    pub fn video_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.video_pids.iter().copied()
    }

    /// Process one downloaded segment into tagged packets, in order.
    ///
    /// `first_segment` restarts the segment-local frame counter; it is
    /// set for the first segment of a stream and after discontinuities.
    pub fn process_segment(&mut self, data: &Bytes, first_segment: bool) -> Vec<TaggedPacket> {
        if data.is_empty() {
            return Vec::new();
        }

        let Some(sync_offset) = find_sync(data) else {
            self.stats.segments_skipped += 1;
            warn!(len = data.len(), "no TS sync found in segment, skipping");
            return Vec::new();
        };

        if sync_offset > 0 {
            trace!(offset = sync_offset, "resynced inside segment");
        }

        if first_segment {
            self.segment_frame = 0;
            self.last_frame_at = None;
        }

        let mut packets = Vec::with_capacity((data.len() - sync_offset) / PACKET_SIZE);
        let mut offset = sync_offset;

        while offset + PACKET_SIZE <= data.len() {
            if data[offset] != SYNC_BYTE {
                // Sync lost mid-segment; everything before this point is
                // still valid, the remainder is dropped.
                warn!(offset, "sync lost mid-segment, truncating");
                break;
            }

            let chunk = data.slice(offset..offset + PACKET_SIZE);
            offset += PACKET_SIZE;

            let Ok(packet) = TsPacket::parse(chunk) else {
                break;
            };

            packets.push(self.tag_packet(packet));
        }

        self.stats.segments_processed += 1;
        self.stats.packets_emitted += packets.len() as u64;
        packets
    }

    fn tag_packet(&mut self, packet: TsPacket) -> TaggedPacket {
        let discontinuity = packet.discontinuity_indicator();
        let continuity = self.check_continuity(&packet);
        let category = self.classify(&packet);

        let counters = self.stats.pids.entry(packet.pid).or_default();
        counters.packets += 1;
        match continuity {
            ContinuityStatus::Duplicate => counters.duplicates += 1,
            ContinuityStatus::DuplicateError => counters.errors += 1,
            ContinuityStatus::Gap { .. } => counters.gaps += 1,
            _ => {}
        }

        if matches!(continuity, ContinuityStatus::Gap { .. }) && category.is_video() {
            self.awaiting_sync.insert(packet.pid);
        }

        let mut sync_valid = true;
        let mut frame = None;

        if category.is_video() && packet.payload_unit_start_indicator {
            let key_frame = packet.random_access_indicator()
                || packet
                    .payload()
                    .is_some_and(|payload| detect_key_frame(&payload));

            if self.awaiting_sync.contains(&packet.pid) {
                if key_frame {
                    self.awaiting_sync.remove(&packet.pid);
                } else {
                    sync_valid = false;
                }
            }

            self.global_frame += 1;
            self.segment_frame += 1;
            self.stats.frames_tagged += 1;

            let now = Instant::now();
            if let Some(previous) = self.last_frame_at {
                let delta = now.duration_since(previous);
                if !delta.is_zero() {
                    self.estimated_frame_duration = Some(delta);
                }
            }
            self.last_frame_at = Some(now);

            frame = Some(FrameTag {
                global: self.global_frame,
                segment_local: self.segment_frame,
                key_frame,
                duration: self.estimated_frame_duration,
            });
        } else if category.is_video() && self.awaiting_sync.contains(&packet.pid) {
            sync_valid = false;
        }

        TaggedPacket {
            packet,
            category,
            continuity,
            discontinuity,
            frame,
            sync_valid,
        }
    }

    /// Counter validation is independent of the discontinuity
    /// indicator: a packet can carry the flag and still be a counted
    /// gap. A real re-anchor goes through [`SegmentProcessor::reset`],
    /// which clears the tracked counters.
    fn check_continuity(&mut self, packet: &TsPacket) -> ContinuityStatus {
        if packet.pid == PID_NULL {
            return ContinuityStatus::Ok;
        }

        let cc = packet.continuity_counter;
        match self.last_cc.get(&packet.pid).copied() {
            None => {
                self.last_cc.insert(packet.pid, cc);
                ContinuityStatus::Initial
            }
            Some(last) if packet.has_payload() => {
                let expected = (last + 1) & 0x0F;
                if cc == expected {
                    self.last_cc.insert(packet.pid, cc);
                    ContinuityStatus::Ok
                } else if cc == last {
                    ContinuityStatus::DuplicateError
                } else {
                    self.last_cc.insert(packet.pid, cc);
                    ContinuityStatus::Gap { expected, actual: cc }
                }
            }
            Some(last) => {
                if cc == last {
                    ContinuityStatus::Duplicate
                } else {
                    self.last_cc.insert(packet.pid, cc);
                    ContinuityStatus::Gap {
                        expected: last,
                        actual: cc,
                    }
                }
            }
        }
    }

    fn classify(&mut self, packet: &TsPacket) -> PidCategory {
        if let Some(category) = PidCategory::well_known(packet.pid) {
            if packet.pid == PID_PAT && packet.payload_unit_start_indicator {
                self.learn_pmt_pids(packet);
            }
            return category;
        }

        if self.pmt_pids.contains(&packet.pid) {
            return PidCategory::Pmt;
        }
        if self.video_pids.contains(&packet.pid) {
            return PidCategory::Video;
        }
        if self.audio_pids.contains(&packet.pid) {
            return PidCategory::Audio;
        }

        if packet.payload_unit_start_indicator
            && let Some(payload) = packet.payload()
            && payload.len() >= 4
            && payload[0] == 0x00
            && payload[1] == 0x00
            && payload[2] == 0x01
        {
            let stream_id = payload[3];
            match stream_id {
                0xE0..=0xEF => {
                    debug!(pid = packet.pid, stream_id, "detected video PID");
                    self.video_pids.insert(packet.pid);
                    return PidCategory::Video;
                }
                0xC0..=0xDF => {
                    debug!(pid = packet.pid, stream_id, "detected audio PID");
                    self.audio_pids.insert(packet.pid);
                    return PidCategory::Audio;
                }
                0xBD => return PidCategory::Private,
                _ => {}
            }
        }

        PidCategory::Unknown
    }

    /// Learn PMT PIDs from a PAT section so PMT traffic classifies as
    /// essential for smart filtering.
    fn learn_pmt_pids(&mut self, packet: &TsPacket) {
        let Some(psi) = packet.psi_payload() else {
            return;
        };
        if psi.len() < 8 || psi[0] != 0x00 {
            return;
        }

        let section_length = (((psi[1] & 0x0F) as usize) << 8) | psi[2] as usize;
        // Program loop runs from after the 5-byte section header to the CRC.
        let end = (3 + section_length).saturating_sub(4).min(psi.len());
        let mut pos = 8;
        while pos + 4 <= end {
            let program_number = ((psi[pos] as u16) << 8) | psi[pos + 1] as u16;
            let pid = (((psi[pos + 2] & 0x1F) as u16) << 8) | psi[pos + 3] as u16;
            if program_number != 0 && self.pmt_pids.insert(pid) {
                debug!(pid, program_number, "learned PMT PID from PAT");
            }
            pos += 4;
        }
    }
}

/// Find the first plausible sync position: a `0x47` byte followed by
/// another `0x47` exactly one packet later (or the end of the data).
/// The double check avoids locking on a `0x47` inside elementary-stream
/// payload.
fn find_sync(data: &[u8]) -> Option<usize> {
    for offset in memchr_iter(SYNC_BYTE, data) {
        if offset + PACKET_SIZE > data.len() {
            return None;
        }
        if offset + PACKET_SIZE == data.len() || data[offset + PACKET_SIZE] == SYNC_BYTE {
            return Some(offset);
        }
    }
    None
}

/// Scan the early payload bytes for key-frame start patterns:
/// an MPEG-2 picture start code whose picture_coding_type is I, or an
/// H.264 NAL unit whose type is 5 (IDR).
fn detect_key_frame(payload: &[u8]) -> bool {
    let window = payload.len().min(64);
    if window < 4 {
        return false;
    }
    for i in 0..window - 3 {
        if payload[i] == 0x00 && payload[i + 1] == 0x00 && payload[i + 2] == 0x01 {
            let code = payload[i + 3];
            if code == 0x00 {
                // MPEG-2 picture header: coding type sits in the second
                // byte after the temporal reference.
                if i + 5 < payload.len() {
                    let coding_type = (payload[i + 5] >> 3) & 0x07;
                    if coding_type == 0x01 {
                        return true;
                    }
                }
            } else if (0x01..=0x7F).contains(&code) && (code & 0x1F) == 0x05 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_packet(pid: u16, cc: u8, pusi: bool, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0xFFu8; PACKET_SIZE];
        data[0] = SYNC_BYTE;
        data[1] = ((pid >> 8) as u8) & 0x1F;
        if pusi {
            data[1] |= 0x40;
        }
        data[2] = (pid & 0xFF) as u8;
        data[3] = 0x10 | (cc & 0x0F); // payload only
        let n = payload.len().min(PACKET_SIZE - 4);
        data[4..4 + n].copy_from_slice(&payload[..n]);
        data
    }

    fn adaptation_only_packet(pid: u16, cc: u8, flags: u8) -> Vec<u8> {
        let mut data = vec![0xFFu8; PACKET_SIZE];
        data[0] = SYNC_BYTE;
        data[1] = ((pid >> 8) as u8) & 0x1F;
        data[2] = (pid & 0xFF) as u8;
        data[3] = 0x20 | (cc & 0x0F); // adaptation only
        data[4] = 183;
        data[5] = flags;
        data
    }

    fn video_pes_start(idr: bool) -> Vec<u8> {
        // PES start code + video stream id, then a NAL start code.
        let nal = if idr { 0x65 } else { 0x41 };
        vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, nal]
    }

    fn audio_pes_start() -> Vec<u8> {
        vec![0x00, 0x00, 0x01, 0xC0, 0x00, 0x00]
    }

    fn segment(packets: &[Vec<u8>]) -> Bytes {
        let mut out = Vec::new();
        for p in packets {
            out.extend_from_slice(p);
        }
        Bytes::from(out)
    }

    #[test]
    fn test_empty_segment_produces_nothing() {
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&Bytes::new(), true);
        assert!(packets.is_empty());
        assert_eq!(proc.stats().segments_skipped, 0);
    }

    #[test]
    fn test_no_sync_is_skipped() {
        let mut proc = SegmentProcessor::new();
        let data = Bytes::from(vec![0x00u8; 1024]);
        let packets = proc.process_segment(&data, true);
        assert!(packets.is_empty());
        assert_eq!(proc.stats().segments_skipped, 1);
    }

    #[test]
    fn test_sync_at_offset_one() {
        let mut proc = SegmentProcessor::new();
        let mut data = vec![0x00u8];
        data.extend_from_slice(&raw_packet(0x100, 0, false, &[]));
        data.extend_from_slice(&raw_packet(0x100, 1, false, &[]));
        let packets = proc.process_segment(&Bytes::from(data), true);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].packet.pid, 0x100);
    }

    #[test]
    fn test_false_sync_byte_is_rejected() {
        // A 0x47 at offset 0 with garbage one packet later, then real
        // packets starting at offset 7.
        let mut data = vec![SYNC_BYTE, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&raw_packet(0x200, 0, false, &[]));
        data.extend_from_slice(&raw_packet(0x200, 1, false, &[]));
        // Ensure the byte 188 after the false sync is not 0x47.
        assert_ne!(data[PACKET_SIZE], SYNC_BYTE);

        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&Bytes::from(data), true);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].packet.pid, 0x200);
    }

    #[test]
    fn test_truncated_tail_is_discarded() {
        let mut data = raw_packet(0x100, 0, false, &[]);
        data.extend_from_slice(&[SYNC_BYTE, 0x01, 0x00]); // partial packet
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&Bytes::from(data), true);
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn test_emitted_bytes_equal_input_when_aligned() {
        let input = segment(&[
            raw_packet(0x100, 0, true, &video_pes_start(false)),
            raw_packet(0x100, 1, false, &[0xAA; 100]),
            raw_packet(0x101, 0, true, &audio_pes_start()),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        let mut out = Vec::new();
        for p in &packets {
            out.extend_from_slice(p.packet.data());
        }
        assert_eq!(out.as_slice(), input.as_ref());
    }

    #[test]
    fn test_video_classification_is_memoised() {
        let input = segment(&[
            raw_packet(0x100, 0, true, &video_pes_start(false)),
            raw_packet(0x100, 1, false, &[0xAA; 10]),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[0].category, PidCategory::Video);
        // Continuation packet has no PES header but stays classified.
        assert_eq!(packets[1].category, PidCategory::Video);
    }

    #[test]
    fn test_audio_classification() {
        let input = segment(&[raw_packet(0x101, 0, true, &audio_pes_start())]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[0].category, PidCategory::Audio);
        assert!(packets[0].frame.is_none());
    }

    #[test]
    fn test_frame_numbers_only_on_video_pusi() {
        let input = segment(&[
            raw_packet(0x100, 0, true, &video_pes_start(true)),
            raw_packet(0x100, 1, false, &[0xAA; 10]),
            raw_packet(0x100, 2, true, &video_pes_start(false)),
            raw_packet(0x101, 0, true, &audio_pes_start()),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);

        let f0 = packets[0].frame.expect("first video PUSI tagged");
        assert_eq!(f0.global, 1);
        assert_eq!(f0.segment_local, 1);
        assert!(f0.key_frame);

        assert!(packets[1].frame.is_none());

        let f2 = packets[2].frame.expect("second video PUSI tagged");
        assert_eq!(f2.global, 2);
        assert_eq!(f2.segment_local, 2);
        assert!(!f2.key_frame);

        assert!(packets[3].frame.is_none());
    }

    #[test]
    fn test_frame_numbering_restarts_after_reset() {
        let input = segment(&[raw_packet(0x100, 0, true, &video_pes_start(true))]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[0].frame.unwrap().global, 1);

        proc.reset();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[0].frame.unwrap().global, 1);
        assert_eq!(packets[0].frame.unwrap().segment_local, 1);
    }

    #[test]
    fn test_segment_local_counter_spans_segments_in_one_region() {
        let mut proc = SegmentProcessor::new();
        let one = segment(&[raw_packet(0x100, 0, true, &video_pes_start(true))]);
        let two = segment(&[raw_packet(0x100, 1, true, &video_pes_start(false))]);
        let packets = proc.process_segment(&one, true);
        assert_eq!(packets[0].frame.unwrap().segment_local, 1);
        let packets = proc.process_segment(&two, false);
        assert_eq!(packets[0].frame.unwrap().segment_local, 2);
        assert_eq!(packets[0].frame.unwrap().global, 2);
    }

    #[test]
    fn test_continuity_ok_and_gap() {
        let input = segment(&[
            raw_packet(0x100, 0, false, &[1]),
            raw_packet(0x100, 1, false, &[2]),
            raw_packet(0x100, 5, false, &[3]),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[0].continuity, ContinuityStatus::Initial);
        assert_eq!(packets[1].continuity, ContinuityStatus::Ok);
        assert_eq!(
            packets[2].continuity,
            ContinuityStatus::Gap {
                expected: 2,
                actual: 5
            }
        );
        assert_eq!(proc.stats().pids[&0x100].gaps, 1);
    }

    #[test]
    fn test_continuity_wraps_mod_16() {
        let input = segment(&[
            raw_packet(0x100, 15, false, &[1]),
            raw_packet(0x100, 0, false, &[2]),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[1].continuity, ContinuityStatus::Ok);
    }

    #[test]
    fn test_duplicate_with_payload_is_error() {
        let input = segment(&[
            raw_packet(0x100, 3, false, &[1]),
            raw_packet(0x100, 3, false, &[1]),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[1].continuity, ContinuityStatus::DuplicateError);
        assert_eq!(proc.stats().pids[&0x100].errors, 1);
    }

    #[test]
    fn test_adaptation_only_duplicate_is_valid() {
        let input = segment(&[
            adaptation_only_packet(0x100, 5, 0x00),
            adaptation_only_packet(0x100, 5, 0x00),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[1].continuity, ContinuityStatus::Duplicate);
        assert_eq!(proc.stats().pids[&0x100].errors, 0);
    }

    #[test]
    fn test_discontinuity_indicator_and_counter_gap_are_independent() {
        // The flag does not excuse a counter jump: both facts are
        // recorded, as separate per-PID diagnostics.
        let mut second = adaptation_only_packet(0x100, 9, 0x80);
        // give it a payload too (afc = 3) so the jump counts as a gap
        second[3] = 0x30 | 9;
        second[4] = 10;
        let input = segment(&[raw_packet(0x100, 1, false, &[1]), second]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert!(packets[1].discontinuity);
        assert_eq!(
            packets[1].continuity,
            ContinuityStatus::Gap {
                expected: 2,
                actual: 9
            }
        );
        assert_eq!(proc.stats().pids[&0x100].gaps, 1);

        // Counter tracking resumes from the flagged packet's value.
        let next = segment(&[raw_packet(0x100, 10, false, &[2])]);
        let packets = proc.process_segment(&next, false);
        assert_eq!(packets[0].continuity, ContinuityStatus::Ok);
    }

    #[test]
    fn test_null_pid_is_not_tracked() {
        let input = segment(&[
            raw_packet(PID_NULL, 0, false, &[]),
            raw_packet(PID_NULL, 9, false, &[]),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[1].continuity, ContinuityStatus::Ok);
        assert_eq!(packets[0].category, PidCategory::Null);
    }

    #[test]
    fn test_sync_valid_drops_after_gap_until_key_frame() {
        let mut proc = SegmentProcessor::new();
        let input = segment(&[
            raw_packet(0x100, 0, true, &video_pes_start(true)),
            raw_packet(0x100, 7, true, &video_pes_start(false)), // gap, not a key frame
            raw_packet(0x100, 8, true, &video_pes_start(true)),  // IDR restores sync
        ]);
        let packets = proc.process_segment(&input, true);
        assert!(packets[0].sync_valid);
        assert!(!packets[1].sync_valid);
        assert!(packets[2].sync_valid);
    }

    #[test]
    fn test_pat_learns_pmt_pid() {
        // Minimal PAT: pointer field, table id 0, one program -> PMT PID 0x1000.
        let mut psi = vec![0x00u8]; // pointer field
        psi.extend_from_slice(&[
            0x00, // table id
            0xB0, 0x0D, // section length 13
            0x00, 0x01, // transport stream id
            0xC1, 0x00, 0x00, // version/section numbers
            0x00, 0x01, // program number 1
            0xF0, 0x00, // PMT PID 0x1000
            0x00, 0x00, 0x00, 0x00, // CRC (unchecked)
        ]);
        let input = segment(&[
            raw_packet(PID_PAT, 0, true, &psi),
            raw_packet(0x1000, 0, true, &[0x00, 0x02]),
        ]);
        let mut proc = SegmentProcessor::new();
        let packets = proc.process_segment(&input, true);
        assert_eq!(packets[0].category, PidCategory::Pat);
        assert_eq!(packets[1].category, PidCategory::Pmt);
    }

    #[test]
    fn test_detect_key_frame_mpeg2() {
        // Picture start code with picture_coding_type I (bits 5..3 == 001).
        let payload = [0x00, 0x00, 0x01, 0x00, 0x00, 0x0F];
        assert!(detect_key_frame(&payload));
        // P-picture (coding type 2) is not a key frame.
        let payload = [0x00, 0x00, 0x01, 0x00, 0x00, 0x17];
        assert!(!detect_key_frame(&payload));
    }

    #[test]
    fn test_detect_key_frame_h264_idr() {
        let payload = [0x00, 0x00, 0x01, 0x65, 0x88];
        assert!(detect_key_frame(&payload));
        let payload = [0x00, 0x00, 0x01, 0x41, 0x9A];
        assert!(!detect_key_frame(&payload));
    }
}
