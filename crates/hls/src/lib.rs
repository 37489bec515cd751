//! HLS (HTTP Live Streaming) media playlist handling
//!
//! Parses M3U8 media playlists into segment descriptors with resolved
//! URLs, sequence numbers, discontinuity flags, and SCTE-35 ad-break
//! markers, and serialises them back for inspection.

pub mod error;
pub mod playlist;
pub mod segment;

pub use error::PlaylistError;
pub use playlist::{MediaPlaylistInfo, parse_media_playlist};
pub use segment::{AdBoundary, SegmentDescriptor};

/// Result type for playlist operations
pub type Result<T> = std::result::Result<T, PlaylistError>;
