//! Live restreaming engine: ingests an HLS media playlist, processes
//! its segments as MPEG-TS, and delivers a continuous byte stream to a
//! media player process through a pipe.
//!
//! The pipeline per stream is: playlist refresh -> segment sequencing ->
//! download -> TS processing -> PID filtering -> bounded buffer ->
//! pipe writer, driven by one ingester task and one writer task plus a
//! player-health monitor, all coordinated through a single
//! `CancellationToken`.

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fetch;
pub mod filter;
pub mod ingest;
pub mod player;
pub mod resource;
pub mod retry;
pub mod sequencer;

pub use buffer::{Popped, TsBuffer, Watermarks};
pub use config::{BufferConfig, FetcherConfig, PlayerConfig, StreamConfig};
pub use coordinator::{StreamCoordinator, StreamHandle, StreamStats};
pub use error::StreamError;
pub use events::{StopReason, StreamEvent};
pub use fetch::{HttpFetcher, MediaSource};
pub use filter::{DiscontinuityMode, FilterMode, PidFilter, PidFilterConfig, PidStats};
pub use resource::ResourceCoordinator;
pub use sequencer::{RefreshOutcome, SegmentSequencer};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, StreamError>;
