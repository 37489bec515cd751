use std::path::PathBuf;
use std::time::Duration;

use crate::filter::PidFilterConfig;

/// Default user agent sent with playlist and segment requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

// --- Fetcher configuration ---
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Base for exponential backoff between retries.
    pub retry_delay_base: Duration,
    pub max_retry_delay: Duration,
    /// Skip TLS certificate validation. On by default to match upstream
    /// CDN behaviour; switch off with `--strict-tls`.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay_base: Duration::from_millis(600),
            max_retry_delay: Duration::from_secs(5),
            accept_invalid_certs: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// --- Player configuration ---
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Path to the player executable.
    pub path: PathBuf,
    /// Arguments; a single `-` tells the player to read standard input.
    pub args: Vec<String>,
    /// Redirect the player's stdout/stderr to a null sink instead of
    /// inheriting the host's.
    pub quiet: bool,
    /// Interval between process liveness polls.
    pub health_poll_interval: Duration,
    /// Consecutive not-running observations before the player is
    /// declared dead. Absorbs transient scheduler pressure when many
    /// streams are active.
    pub health_tolerance: u32,
    /// How long an exiting player is given before it is killed.
    pub shutdown_grace: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mpv"),
            args: vec!["-".to_string()],
            quiet: false,
            health_poll_interval: Duration::from_millis(500),
            health_tolerance: 3,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

// --- Buffer configuration ---
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum packets held in the TS buffer. The resource coordinator
    /// scales this up under multi-stream load.
    pub capacity_packets: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity_packets: 15_000,
        }
    }
}

// --- Top-level configuration ---
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub fetcher: FetcherConfig,
    pub player: PlayerConfig,
    pub buffer: BufferConfig,
    pub filter: PidFilterConfig,
    /// Minimum playlist refresh interval; the effective interval never
    /// exceeds the playlist's target duration.
    pub refresh_interval: Duration,
    /// Aggressive watermarks and live-edge skipping.
    pub low_latency: bool,
    /// Cap on how many segments behind the live edge the sequencer will
    /// schedule when catching up in low-latency mode.
    pub max_segments_to_buffer: usize,
    /// Skip downloading segments inside an SCTE-35 signalled ad break.
    /// Off by default; the markers are still surfaced as events.
    pub ad_skip_enabled: bool,
    /// Stop the stream after this many consecutive refresh failures.
    pub max_consecutive_failures: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            player: PlayerConfig::default(),
            buffer: BufferConfig::default(),
            filter: PidFilterConfig::default(),
            refresh_interval: Duration::from_millis(1000),
            low_latency: false,
            max_segments_to_buffer: 3,
            ad_skip_enabled: false,
            max_consecutive_failures: 5,
        }
    }
}

impl StreamConfig {
    pub fn with_low_latency(mut self, enabled: bool) -> Self {
        self.low_latency = enabled;
        self
    }

    pub fn with_player_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.player.path = path.into();
        self
    }

    pub fn with_buffer_capacity(mut self, packets: usize) -> Self {
        self.buffer.capacity_packets = packets;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}
