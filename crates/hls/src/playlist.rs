use std::fmt::Write as _;

use tracing::{trace, warn};
use url::Url;

use crate::error::PlaylistError;
use crate::segment::{AdBoundary, SegmentDescriptor};

/// A parsed media playlist: playlist-level attributes plus the ordered
/// segment descriptors.
///
/// The parser keeps no state across calls; continuity across refreshes
/// is the sequencer's responsibility.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylistInfo {
    /// Target segment duration in milliseconds.
    pub target_duration_ms: u64,
    /// `#EXT-X-MEDIA-SEQUENCE` base for the first segment.
    pub media_sequence_base: u64,
    /// True when the playlist carries `#EXT-X-ENDLIST` (VOD-complete).
    pub end_list: bool,
    /// True when any segment carries a discontinuity flag.
    pub has_discontinuity: bool,
    pub segments: Vec<SegmentDescriptor>,
}

impl MediaPlaylistInfo {
    /// Newest segment of the playlist (the live edge), if any.
    pub fn live_edge(&self) -> Option<&SegmentDescriptor> {
        self.segments.last()
    }

    /// Serialise back to M3U8 text. Unknown tags from the source are
    /// not preserved; reparsing the output yields the same descriptors.
    pub fn to_m3u8(&self) -> String {
        let mut out = String::new();
        out.push_str("#EXTM3U\n#EXT-X-VERSION:3\n");
        let _ = writeln!(
            out,
            "#EXT-X-TARGETDURATION:{}",
            self.target_duration_ms.div_ceil(1000)
        );
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence_base);
        for segment in &self.segments {
            if segment.discontinuity {
                out.push_str("#EXT-X-DISCONTINUITY\n");
            }
            match segment.ad_boundary {
                Some(AdBoundary::Start) => out.push_str("#EXT-X-SCTE35-OUT\n"),
                Some(AdBoundary::End) => out.push_str("#EXT-X-SCTE35-IN\n"),
                None => {}
            }
            let _ = writeln!(out, "#EXTINF:{:.3},", segment.duration_ms as f64 / 1000.0);
            let _ = writeln!(out, "{}", segment.url);
        }
        if self.end_list {
            out.push_str("#EXT-X-ENDLIST\n");
        }
        out
    }
}

/// Parse the raw text of an M3U8 media playlist.
///
/// Relative segment URIs are resolved against `playlist_url`; absolute
/// URIs pass through. Segment `i` is assigned sequence
/// `media_sequence_base + i`.
pub fn parse_media_playlist(
    text: &str,
    playlist_url: &Url,
) -> Result<MediaPlaylistInfo, PlaylistError> {
    let playlist = match m3u8_rs::parse_playlist_res(text.as_bytes()) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => pl,
        Ok(m3u8_rs::Playlist::MasterPlaylist(_)) => {
            return Err(PlaylistError::NotMediaPlaylist);
        }
        Err(e) => {
            return Err(PlaylistError::Parse {
                reason: e.to_string(),
            });
        }
    };

    let mut segments = Vec::with_capacity(playlist.segments.len());
    let mut has_discontinuity = false;

    for (index, segment) in playlist.segments.iter().enumerate() {
        let url = match resolve_uri(playlist_url, &segment.uri) {
            Ok(url) => url,
            Err(e) => {
                // An individually unresolvable line is skipped, the rest
                // of the playlist still parses.
                warn!(uri = %segment.uri, error = %e, "skipping unparseable segment URI");
                continue;
            }
        };

        if segment.discontinuity {
            has_discontinuity = true;
        }

        segments.push(SegmentDescriptor {
            url,
            sequence: playlist.media_sequence + index as u64,
            duration_ms: (segment.duration as f64 * 1000.0).round() as u64,
            discontinuity: segment.discontinuity,
            ad_boundary: ad_boundary_from_tags(segment),
        });
    }

    trace!(
        segments = segments.len(),
        media_sequence = playlist.media_sequence,
        end_list = playlist.end_list,
        "parsed media playlist"
    );

    Ok(MediaPlaylistInfo {
        target_duration_ms: playlist.target_duration * 1000,
        media_sequence_base: playlist.media_sequence,
        end_list: playlist.end_list,
        has_discontinuity,
        segments,
    })
}

fn resolve_uri(playlist_url: &Url, uri: &str) -> Result<Url, PlaylistError> {
    playlist_url
        .join(uri)
        .map_err(|e| PlaylistError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}

/// SCTE-35 markers land in the segment's unknown-tag list; `m3u8-rs`
/// stores them without the `#EXT-` prefix.
fn ad_boundary_from_tags(segment: &m3u8_rs::MediaSegment) -> Option<AdBoundary> {
    for tag in &segment.unknown_tags {
        if tag.tag.eq_ignore_ascii_case("X-SCTE35-OUT") {
            return Some(AdBoundary::Start);
        }
        if tag.tag.eq_ignore_ascii_case("X-SCTE35-IN") {
            return Some(AdBoundary::End);
        }
    }
    None
}
