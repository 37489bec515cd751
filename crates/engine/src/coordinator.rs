// Stream coordinator: sets up and spawns the per-stream pipeline tasks
// (ingester, pipe writer, player-health monitor) and supervises their
// shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::buffer::{Popped, TsBuffer};
use crate::config::{PlayerConfig, StreamConfig};
use crate::error::StreamError;
use crate::events::{StopReason, StopSlot, StreamEvent};
use crate::fetch::{HttpFetcher, MediaSource};
use crate::ingest::Ingester;
use crate::player::{PacketSink, PlayerProcess, spawn_player};
use crate::resource::{ResourceCoordinator, StreamSlot};

/// Writer-side counters, shared with the handle for diagnostics.
#[derive(Debug, Default)]
pub struct StreamStats {
    pub packets_written: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_duplicated: AtomicU64,
}

/// A running stream: event receiver plus control surface.
pub struct StreamHandle {
    events: mpsc::Receiver<StreamEvent>,
    token: CancellationToken,
    stats: Arc<StreamStats>,
    supervisor: JoinHandle<StopReason>,
}

impl StreamHandle {
    /// Request cooperative shutdown.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Receive the next stream event.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Wait for the stream to finish and return why it stopped.
    pub async fn wait(self) -> StopReason {
        // Drop the event receiver first so slow consumers never hold
        // the pipeline up.
        drop(self.events);
        match self.supervisor.await {
            Ok(reason) => reason,
            Err(e) => {
                error!(error = %e, "stream supervisor panicked");
                StopReason::Cancelled
            }
        }
    }
}

/// Sets up and spawns all pipeline components for one stream.
pub struct StreamCoordinator;

impl StreamCoordinator {
    pub fn start(
        playlist_url: Url,
        config: StreamConfig,
        resource: &Arc<ResourceCoordinator>,
        token: CancellationToken,
    ) -> Result<StreamHandle, StreamError> {
        let config = Arc::new(config);
        let slot = resource.register();
        let start_delay = resource.recommended_start_delay();

        let capacity = resource.recommended_buffer_packets(config.buffer.capacity_packets);
        let buffer = Arc::new(TsBuffer::new(capacity, config.low_latency));

        let source: Arc<dyn MediaSource> = Arc::new(HttpFetcher::new(
            config.fetcher.clone(),
            token.clone(),
        )?);

        let (player, sink) = spawn_player(&config.player, resource.recommended_pipe_buffer())?;

        let stop = Arc::new(StopSlot::new());
        let stats = Arc::new(StreamStats::default());
        let (event_tx, event_rx) = mpsc::channel(64);

        info!(
            url = %playlist_url,
            buffer_capacity = capacity,
            low_latency = config.low_latency,
            active_streams = resource.active_streams(),
            "starting stream"
        );

        let ingester = Ingester::new(
            Arc::clone(&source),
            playlist_url,
            Arc::clone(&config),
            Arc::clone(&buffer),
            token.clone(),
            Arc::clone(&stop),
            event_tx.clone(),
            start_delay,
        );
        let ingester_handle = tokio::spawn(ingester.run());

        let writer_handle = tokio::spawn(writer_loop(
            Arc::clone(&buffer),
            sink,
            token.clone(),
            Arc::clone(&stop),
            Arc::clone(&stats),
            config.low_latency,
        ));

        let health_handle = tokio::spawn(health_loop(
            player,
            config.player.clone(),
            token.clone(),
            Arc::clone(&stop),
        ));

        let supervisor = tokio::spawn(supervise(
            ingester_handle,
            writer_handle,
            health_handle,
            token.clone(),
            Arc::clone(&stop),
            event_tx,
            slot,
        ));

        Ok(StreamHandle {
            events: event_rx,
            token,
            stats,
            supervisor,
        })
    }
}

async fn supervise(
    ingester: JoinHandle<()>,
    writer: JoinHandle<()>,
    health: JoinHandle<Option<i32>>,
    token: CancellationToken,
    stop: Arc<StopSlot>,
    events: mpsc::Sender<StreamEvent>,
    slot: StreamSlot,
) -> StopReason {
    if let Err(e) = ingester.await {
        error!(error = %e, "ingester task panicked");
        stop.set(StopReason::Cancelled);
        token.cancel();
    }
    if let Err(e) = writer.await {
        error!(error = %e, "writer task panicked");
    }

    // Ingestion and delivery are done (or dead); release the player.
    token.cancel();
    let exit_code = health.await.unwrap_or(None);

    let reason = stop.get().unwrap_or(StopReason::Cancelled);
    if reason.is_normal() {
        info!("stream completed normally");
    } else {
        warn!(?reason, exit_code, "stream ended");
    }
    let _ = events.try_send(StreamEvent::StreamEnded { reason });
    drop(slot);
    reason
}

/// Drains the TS buffer into the player pipe, packet by packet.
async fn writer_loop(
    buffer: Arc<TsBuffer>,
    mut sink: PacketSink,
    token: CancellationToken,
    stop: Arc<StopSlot>,
    stats: Arc<StreamStats>,
    low_latency: bool,
) {
    let pop_timeout = if low_latency {
        Duration::from_millis(10)
    } else {
        Duration::from_millis(50)
    };
    let mut last_frame: u64 = 0;

    loop {
        // Exit immediately on cancellation; a closed buffer is drained
        // to the end instead.
        if token.is_cancelled() {
            debug!("writer cancelled");
            break;
        }

        match buffer.pop(pop_timeout).await {
            Popped::Packet(packet) => {
                if let Some(frame) = packet.frame {
                    if frame.global > last_frame + 1 && last_frame > 0 {
                        let dropped = frame.global - last_frame - 1;
                        stats.frames_dropped.fetch_add(dropped, Ordering::Relaxed);
                        warn!(
                            dropped,
                            from = last_frame,
                            to = frame.global,
                            "frame drop detected"
                        );
                    } else if frame.global <= last_frame && frame.global > 1 {
                        stats.frames_duplicated.fetch_add(1, Ordering::Relaxed);
                        debug!(frame = frame.global, last_frame, "duplicate or reordered frame");
                    }
                    // A restart at 1 is a new continuity region, not a drop.
                    last_frame = frame.global;
                }

                if let Err(e) = sink.write_packet(packet.packet.data()).await {
                    error!(error = %e, "pipe write failed, cancelling stream");
                    stop.set(StopReason::PipeBroken);
                    token.cancel();
                    break;
                }
                stats.packets_written.fetch_add(1, Ordering::Relaxed);
            }
            Popped::Empty => {}
            Popped::Closed => {
                debug!("buffer closed, writer draining complete");
                break;
            }
        }
    }

    if let Err(e) = sink.flush().await {
        debug!(error = %e, "final flush failed");
    }
    info!(
        packets = stats.packets_written.load(Ordering::Relaxed),
        frames_dropped = stats.frames_dropped.load(Ordering::Relaxed),
        "writer finished"
    );
    // Dropping the sink closes the player's stdin.
}

/// Polls the player process and shuts it down with the configured grace
/// period once the stream winds down.
async fn health_loop(
    mut player: PlayerProcess,
    config: PlayerConfig,
    token: CancellationToken,
    stop: Arc<StopSlot>,
) -> Option<i32> {
    let mut not_running = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("health monitor: shutting player down");
                return player.wait_or_kill(config.shutdown_grace).await;
            }
            _ = tokio::time::sleep(config.health_poll_interval) => {}
        }

        match player.try_status() {
            Ok(None) => {
                not_running = 0;
            }
            Ok(Some(status)) => {
                // Tolerate a few observations before declaring death to
                // absorb transient scheduler pressure.
                not_running += 1;
                if not_running >= config.health_tolerance {
                    let code = status.code();
                    warn!(?code, "player process exited, cancelling stream");
                    stop.set(StopReason::PlayerExited { code });
                    token.cancel();
                    return code;
                }
            }
            Err(e) => {
                not_running += 1;
                warn!(error = %e, "failed to poll player status");
                if not_running >= config.health_tolerance {
                    stop.set(StopReason::PlayerExited { code: None });
                    token.cancel();
                    return player.wait_or_kill(config.shutdown_grace).await;
                }
            }
        }
    }
}
