// Ingester task: drives playlist refresh, segment sequencing, download,
// TS processing, PID filtering, and buffer pushes for one stream.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use hls::{AdBoundary, SegmentDescriptor, parse_media_playlist};
use ts::SegmentProcessor;

use crate::buffer::{TsBuffer, Watermarks};
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::events::{StopReason, StopSlot, StreamEvent};
use crate::fetch::MediaSource;
use crate::filter::PidFilter;
use crate::sequencer::{SegmentSequencer, SequencerConfig};

/// Worst-case cancellation latency for any wait inside the ingester.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

enum RefreshResult {
    Continue,
    /// The playlist carried `#EXT-X-ENDLIST`; remaining segments are
    /// already drained into the buffer.
    Ended,
}

pub struct Ingester {
    source: Arc<dyn MediaSource>,
    playlist_url: Url,
    config: Arc<StreamConfig>,
    sequencer: SegmentSequencer,
    processor: SegmentProcessor,
    filter: PidFilter,
    buffer: Arc<TsBuffer>,
    token: CancellationToken,
    stop: Arc<StopSlot>,
    events: mpsc::Sender<StreamEvent>,
    start_delay: Duration,

    last_playlist_bytes: Option<Bytes>,
    consecutive_failures: u32,
    first_segment: bool,
    in_ad_break: bool,
}

impl Ingester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn MediaSource>,
        playlist_url: Url,
        config: Arc<StreamConfig>,
        buffer: Arc<TsBuffer>,
        token: CancellationToken,
        stop: Arc<StopSlot>,
        events: mpsc::Sender<StreamEvent>,
        start_delay: Duration,
    ) -> Self {
        let sequencer = SegmentSequencer::new(SequencerConfig {
            low_latency: config.low_latency,
            max_segments_to_buffer: config.max_segments_to_buffer,
        });
        let filter = PidFilter::new(config.filter.clone());
        Self {
            source,
            playlist_url,
            config,
            sequencer,
            processor: SegmentProcessor::new(),
            filter,
            buffer,
            token,
            stop,
            events,
            start_delay,
            last_playlist_bytes: None,
            consecutive_failures: 0,
            first_segment: true,
            in_ad_break: false,
        }
    }

    pub async fn run(mut self) {
        // Stagger startup so concurrent streams do not stampede the origin.
        if !self.sleep_cancellable(self.start_delay).await {
            self.finish(StopReason::Cancelled);
            return;
        }

        let mut refresh_interval = self.config.refresh_interval;

        loop {
            if self.token.is_cancelled() {
                self.finish(StopReason::Cancelled);
                return;
            }

            match self.refresh_once(&mut refresh_interval).await {
                Ok(RefreshResult::Continue) => {}
                Ok(RefreshResult::Ended) => {
                    info!("playlist ended, stream complete");
                    self.finish(StopReason::Completed);
                    return;
                }
                Err(StreamError::Cancelled) => {
                    self.finish(StopReason::Cancelled);
                    return;
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    warn!(
                        error = %e,
                        failures = self.consecutive_failures,
                        "playlist refresh failed"
                    );
                    if self.consecutive_failures >= self.config.max_consecutive_failures {
                        error!("consecutive refresh failure cap exceeded, stopping stream");
                        self.finish(StopReason::SourceFailed {
                            consecutive_failures: self.consecutive_failures,
                        });
                        self.token.cancel();
                        return;
                    }
                    // Escalating delay by failure count before retrying.
                    let delay = self.config.refresh_interval * self.consecutive_failures;
                    if !self.sleep_cancellable(delay).await {
                        self.finish(StopReason::Cancelled);
                        return;
                    }
                    continue;
                }
            }

            if !self.sleep_cancellable(refresh_interval).await {
                self.finish(StopReason::Cancelled);
                return;
            }
        }
    }

    fn finish(&mut self, reason: StopReason) {
        self.stop.set(reason);
        self.buffer.close();
        let stats = self.processor.stats();
        info!(
            segments = stats.segments_processed,
            skipped = stats.segments_skipped,
            packets = stats.packets_emitted,
            frames = stats.frames_tagged,
            continuity_errors = stats.continuity_errors(),
            filtered = self.filter.total_dropped(),
            "ingester finished"
        );
    }

    async fn refresh_once(
        &mut self,
        refresh_interval: &mut Duration,
    ) -> Result<RefreshResult, StreamError> {
        let bytes = self.source.fetch_playlist(&self.playlist_url).await?;

        // Unchanged playlist: skip parsing entirely.
        if self.last_playlist_bytes.as_ref() == Some(&bytes) {
            trace!("playlist unchanged");
            self.consecutive_failures = 0;
            return Ok(RefreshResult::Continue);
        }

        let text = std::str::from_utf8(&bytes).map_err(|_| StreamError::PlaylistEncoding)?;
        let playlist = parse_media_playlist(text, &self.playlist_url)?;
        self.last_playlist_bytes = Some(bytes);
        self.consecutive_failures = 0;

        // Refresh at least as often as the target duration suggests.
        if playlist.target_duration_ms > 0 {
            *refresh_interval = self
                .config
                .refresh_interval
                .min(Duration::from_millis(playlist.target_duration_ms));
        }

        let outcome = self.sequencer.on_refresh(&playlist);
        let recovering = outcome.discontinuity;

        if outcome.discontinuity {
            info!("playlist discontinuity: resetting processing state");
            self.processor.reset();
            self.filter.reset();
            self.buffer.clear();
            self.first_segment = true;
            let sequence = outcome
                .released
                .first()
                .map(|s| s.sequence)
                .unwrap_or(playlist.media_sequence_base);
            self.send_event(StreamEvent::Discontinuity { sequence });
        }

        self.send_event(StreamEvent::PlaylistRefreshed {
            media_sequence_base: playlist.media_sequence_base,
            target_duration_ms: playlist.target_duration_ms,
            new_segments: outcome.released.len(),
        });

        self.ingest_released(outcome.released, recovering).await?;

        if playlist.end_list {
            return Ok(RefreshResult::Ended);
        }
        Ok(RefreshResult::Continue)
    }

    async fn ingest_released(
        &mut self,
        segments: Vec<SegmentDescriptor>,
        recovering: bool,
    ) -> Result<(), StreamError> {
        for segment in segments {
            if self.token.is_cancelled() {
                return Err(StreamError::Cancelled);
            }

            if let Some(boundary) = segment.ad_boundary {
                self.in_ad_break = boundary == AdBoundary::Start;
                self.send_event(StreamEvent::AdBoundary {
                    sequence: segment.sequence,
                    boundary,
                });
            }
            if self.config.ad_skip_enabled && self.in_ad_break {
                info!(sequence = segment.sequence, "skipping ad-break segment");
                continue;
            }

            self.wait_for_capacity(recovering).await?;

            match self.ingest_segment(&segment).await {
                Ok(packets) => {
                    self.send_event(StreamEvent::SegmentIngested {
                        sequence: segment.sequence,
                        packets,
                    });
                }
                Err(StreamError::Cancelled) => return Err(StreamError::Cancelled),
                Err(e) => {
                    // One bad segment is not fatal; the stream continues
                    // from the next one.
                    warn!(
                        sequence = segment.sequence,
                        url = %segment.url,
                        error = %e,
                        "skipping segment"
                    );
                }
            }
        }
        Ok(())
    }

    async fn ingest_segment(&mut self, segment: &SegmentDescriptor) -> Result<usize, StreamError> {
        let bytes = self.source.fetch_segment(&segment.url).await?;
        if bytes.is_empty() {
            return Err(StreamError::SegmentCorrupt {
                reason: "empty segment body".to_string(),
            });
        }

        let packets = self.processor.process_segment(&bytes, self.first_segment);
        if packets.is_empty() {
            return Err(StreamError::SegmentCorrupt {
                reason: "no valid TS packets".to_string(),
            });
        }
        self.first_segment = false;

        let kept = self.filter.filter(packets);
        let kept_count = kept.len();
        let mut overflow = 0usize;
        for packet in kept {
            overflow += self.buffer.push(packet);
        }

        debug!(
            sequence = segment.sequence,
            packets = kept_count,
            overflow,
            buffered = self.buffer.len(),
            "segment ingested"
        );
        Ok(kept_count)
    }

    /// Pause downloads while the buffer sits above the high watermark;
    /// resume once it drains below the low one.
    async fn wait_for_capacity(&self, recovering: bool) -> Result<(), StreamError> {
        let watermarks = Watermarks::for_mode(
            self.buffer.capacity(),
            self.config.low_latency,
            recovering,
        );
        if self.buffer.len() < watermarks.high {
            return Ok(());
        }

        debug!(
            buffered = self.buffer.len(),
            high = watermarks.high,
            low = watermarks.low,
            "buffer above high watermark, pausing downloads"
        );
        loop {
            if !self.sleep_cancellable(CANCEL_POLL_INTERVAL).await {
                return Err(StreamError::Cancelled);
            }
            if self.buffer.len() < watermarks.low {
                return Ok(());
            }
        }
    }

    fn send_event(&self, event: StreamEvent) {
        if let Err(e) = self.events.try_send(event) {
            trace!(error = %e, "dropping stream event");
        }
    }

    async fn sleep_cancellable(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
