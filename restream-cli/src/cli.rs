use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use restream_engine::{DiscontinuityMode, FilterMode, StreamConfig};

#[derive(Parser, Debug)]
#[command(
    name = "restream",
    version,
    about = "Restream a live HLS channel into a local media player",
    long_about = "Ingests an HLS media playlist, processes its segments as MPEG-TS, \
                  and pipes the stream into a media player's standard input."
)]
pub struct Args {
    /// Media playlist URL (M3U8)
    pub url: String,

    /// Path to the player executable
    #[arg(long, default_value = "mpv")]
    pub player: PathBuf,

    /// Player argument (repeatable); defaults to a single `-` so the
    /// player reads standard input
    #[arg(long = "player-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub player_args: Vec<String>,

    /// Silence the player's own stdout/stderr
    #[arg(long)]
    pub quiet_player: bool,

    /// Aggressive watermarks and live-edge skipping
    #[arg(long)]
    pub low_latency: bool,

    /// Maximum packets held in the TS buffer
    #[arg(long, value_name = "PACKETS", default_value_t = 15_000)]
    pub buffer_packets: usize,

    /// Minimum playlist refresh interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1_000)]
    pub refresh_interval_ms: u64,

    /// Segments behind the live edge to catch up on (low-latency mode)
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub max_catchup_segments: usize,

    /// PID filtering mode
    #[arg(long, value_enum, default_value_t = FilterModeArg::Auto)]
    pub pid_filter: FilterModeArg,

    /// Discontinuity-indicator handling
    #[arg(long, value_enum, default_value_t = DiscontinuityArg::PassThrough)]
    pub discontinuity: DiscontinuityArg,

    /// PID to allow (repeatable; allow-list mode)
    #[arg(long, value_name = "PID")]
    pub allow_pid: Vec<u16>,

    /// PID to block (repeatable; block-list mode)
    #[arg(long, value_name = "PID")]
    pub block_pid: Vec<u16>,

    /// Validate TLS certificates instead of accepting them all
    #[arg(long)]
    pub strict_tls: bool,

    /// Skip downloading segments inside SCTE-35 signalled ad breaks
    #[arg(long)]
    pub skip_ads: bool,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterModeArg {
    /// Only pass explicitly allowed PIDs
    Allow,
    /// Block listed PIDs, pass the rest
    Block,
    /// Pass everything except auto-detected problematic PIDs
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscontinuityArg {
    /// Pass all packets through
    PassThrough,
    /// Drop packets flagged with a discontinuity indicator
    FilterOut,
    /// Pass but log each flagged packet
    LogOnly,
    /// Keep essential PIDs (PAT/PMT/video/audio), drop the rest
    Smart,
}

impl Args {
    pub fn stream_config(&self) -> StreamConfig {
        let mut config = StreamConfig::default();

        config.player.path = self.player.clone();
        if !self.player_args.is_empty() {
            config.player.args = self.player_args.clone();
        }
        config.player.quiet = self.quiet_player;

        config.buffer.capacity_packets = self.buffer_packets;
        config.refresh_interval = Duration::from_millis(self.refresh_interval_ms);
        config.low_latency = self.low_latency;
        config.max_segments_to_buffer = self.max_catchup_segments;
        config.ad_skip_enabled = self.skip_ads;
        config.fetcher.accept_invalid_certs = !self.strict_tls;

        config.filter.mode = match self.pid_filter {
            FilterModeArg::Allow => FilterMode::AllowList,
            FilterModeArg::Block => FilterMode::BlockList,
            FilterModeArg::Auto => FilterMode::AutoDetect,
        };
        config.filter.discontinuity_mode = match self.discontinuity {
            DiscontinuityArg::PassThrough => DiscontinuityMode::PassThrough,
            DiscontinuityArg::FilterOut => DiscontinuityMode::FilterOut,
            DiscontinuityArg::LogOnly => DiscontinuityMode::LogOnly,
            DiscontinuityArg::Smart => DiscontinuityMode::Smart,
        };
        config.filter.allowed = self.allow_pid.iter().copied().collect();
        config.filter.blocked = self.block_pid.iter().copied().collect();

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_config() {
        let args = Args::parse_from(["restream", "https://example.com/index.m3u8"]);
        let config = args.stream_config();
        assert_eq!(config.player.path, PathBuf::from("mpv"));
        assert_eq!(config.player.args, vec!["-".to_string()]);
        assert_eq!(config.buffer.capacity_packets, 15_000);
        assert!(!config.low_latency);
        assert!(config.fetcher.accept_invalid_certs);
        assert_eq!(config.filter.mode, FilterMode::AutoDetect);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "restream",
            "https://example.com/index.m3u8",
            "--player",
            "vlc",
            "--player-arg",
            "--intf=dummy",
            "--player-arg",
            "-",
            "--low-latency",
            "--buffer-packets",
            "20000",
            "--pid-filter",
            "allow",
            "--allow-pid",
            "256",
            "--discontinuity",
            "smart",
            "--strict-tls",
        ]);
        let config = args.stream_config();
        assert_eq!(config.player.path, PathBuf::from("vlc"));
        assert_eq!(config.player.args.len(), 2);
        assert!(config.low_latency);
        assert_eq!(config.buffer.capacity_packets, 20_000);
        assert_eq!(config.filter.mode, FilterMode::AllowList);
        assert!(config.filter.allowed.contains(&256));
        assert_eq!(
            config.filter.discontinuity_mode,
            DiscontinuityMode::Smart
        );
        assert!(!config.fetcher.accept_invalid_certs);
    }
}
