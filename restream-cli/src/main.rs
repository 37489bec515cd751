mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use restream_engine::{ResourceCoordinator, StopReason, StreamCoordinator, StreamEvent};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use url::Url;

use crate::cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(reason) if reason.is_normal() => {
            info!("stream completed");
        }
        Ok(reason) => {
            error!(?reason, "stream failed or was interrupted");
            std::process::exit(1);
        }
        Err(e) => {
            error!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<StopReason> {
    let url = Url::parse(&args.url).with_context(|| format!("invalid playlist URL {}", args.url))?;
    let config = args.stream_config();

    let resource = ResourceCoordinator::new();
    let token = CancellationToken::new();

    let mut handle = StreamCoordinator::start(url, config, &resource, token.clone())
        .context("failed to start stream")?;

    // Ctrl-C requests cooperative shutdown.
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                token.cancel();
            }
        });
    }

    while let Some(event) = handle.next_event().await {
        match event {
            StreamEvent::PlaylistRefreshed {
                media_sequence_base,
                new_segments,
                ..
            } => {
                if new_segments > 0 {
                    info!(media_sequence_base, new_segments, "playlist refreshed");
                }
            }
            StreamEvent::SegmentIngested { sequence, packets } => {
                info!(sequence, packets, "segment ingested");
            }
            StreamEvent::Discontinuity { sequence } => {
                warn!(sequence, "discontinuity, rejoining live edge");
            }
            StreamEvent::AdBoundary { sequence, boundary } => {
                info!(sequence, ?boundary, "ad-break boundary");
            }
            StreamEvent::StreamEnded { .. } => break,
        }
    }

    let stats = handle.stats();
    info!(
        packets = stats.packets_written.load(std::sync::atomic::Ordering::Relaxed),
        "delivery finished"
    );

    Ok(handle.wait().await)
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
