use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the streaming engine.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream cancelled")]
    Cancelled,

    #[error("operation timed out: {reason}")]
    Timeout { reason: String },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("playlist error: {source}")]
    Playlist {
        #[from]
        source: hls::PlaylistError,
    },

    #[error("playlist is not valid UTF-8")]
    PlaylistEncoding,

    #[error("segment corrupt: {reason}")]
    SegmentCorrupt { reason: String },

    #[error("failed to start player: {source}")]
    PlayerSpawn { source: std::io::Error },

    #[error("player exited (code {code:?})")]
    PlayerExited { code: Option<i32> },

    #[error("pipe to player broken: {source}")]
    PipeBroken { source: std::io::Error },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl StreamError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Whether a retry can reasonably be expected to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            // Anything that made it onto the wire is worth retrying;
            // builder and redirect-policy failures are ours to fix.
            Self::Transport { source } => !(source.is_builder() || source.is_redirect()),
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Cancelled
            | Self::InvalidUrl { .. }
            | Self::Playlist { .. }
            | Self::PlaylistEncoding
            | Self::SegmentCorrupt { .. }
            | Self::PlayerSpawn { .. }
            | Self::PlayerExited { .. }
            | Self::PipeBroken { .. }
            | Self::Internal { .. } => false,
        }
    }
}
