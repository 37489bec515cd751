use url::Url;

/// SCTE-35 ad-break boundary attached to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdBoundary {
    /// `#EXT-X-SCTE35-OUT` — an ad break starts at this segment.
    Start,
    /// `#EXT-X-SCTE35-IN` — the ad break ends at this segment.
    End,
}

/// A parsed reference to one media segment.
///
/// Owned by the ingester for the duration of one segment's processing
/// and dropped once the segment has been ingested or skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Absolute segment URL, resolved against the playlist URL.
    pub url: Url,
    /// Media sequence number assigned by the origin
    /// (`media_sequence_base + index`).
    pub sequence: u64,
    /// Target duration in milliseconds.
    pub duration_ms: u64,
    /// True when the segment was preceded by `#EXT-X-DISCONTINUITY`.
    pub discontinuity: bool,
    /// SCTE-35 ad-break marker, when present.
    pub ad_boundary: Option<AdBoundary>,
}

impl SegmentDescriptor {
    /// Duration in (fractional) seconds, as written in `#EXTINF`.
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}
