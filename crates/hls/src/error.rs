use thiserror::Error;

/// Errors produced while parsing a media playlist.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("failed to parse playlist: {reason}")]
    Parse { reason: String },

    #[error("expected a media playlist, got a master playlist")]
    NotMediaPlaylist,

    #[error("invalid segment URI `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },
}
