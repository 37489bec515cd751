// Player pipeline: launches the media player child process with its
// standard input connected to our pipe, and owns the process handle
// for health checks and bounded-grace shutdown.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::error::StreamError;

/// Build a player command without flashing a console window on Windows.
fn player_command(config: &PlayerConfig) -> Command {
    let mut cmd = Command::new(&config.path);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Owning handle for the player process. Dropping it kills the child
/// as a last resort; orderly shutdown goes through [`wait_or_kill`].
///
/// [`wait_or_kill`]: PlayerProcess::wait_or_kill
#[derive(Debug)]
pub struct PlayerProcess {
    child: Child,
}

/// Write end of the player's stdin pipe. Dropping it closes the pipe,
/// which is how the player learns the stream has ended.
pub struct PacketSink {
    writer: BufWriter<ChildStdin>,
    packets_written: u64,
}

/// Launch the player with stdin piped. `pipe_buffer_bytes` sizes the
/// writer-side buffering (recommended by the resource coordinator).
pub fn spawn_player(
    config: &PlayerConfig,
    pipe_buffer_bytes: usize,
) -> Result<(PlayerProcess, PacketSink), StreamError> {
    let mut cmd = player_command(config);
    cmd.args(&config.args)
        .stdin(Stdio::piped())
        .kill_on_drop(true);

    if config.quiet {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    } else {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    info!(path = %config.path.display(), args = ?config.args, "launching player");

    let mut child = cmd
        .spawn()
        .map_err(|source| StreamError::PlayerSpawn { source })?;

    let stdin = child.stdin.take().ok_or_else(|| StreamError::Internal {
        reason: "player stdin was not piped".to_string(),
    })?;

    debug!(
        pid = child.id(),
        pipe_buffer = pipe_buffer_bytes,
        "player started"
    );

    Ok((
        PlayerProcess { child },
        PacketSink {
            writer: BufWriter::with_capacity(pipe_buffer_bytes, stdin),
            packets_written: 0,
        },
    ))
}

impl PlayerProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking liveness check.
    pub fn try_status(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        self.child.try_wait()
    }

    /// Give the player `grace` to exit on its own (its stdin must
    /// already be closed), then kill it. Returns the exit code when the
    /// process exited by itself.
    pub async fn wait_or_kill(mut self, grace: Duration) -> Option<i32> {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(code = ?status.code(), "player exited");
                status.code()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed waiting for player");
                None
            }
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "player did not exit, killing");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill player");
                }
                None
            }
        }
    }
}

impl PacketSink {
    /// Write one 188-byte packet. Any error (including a short write,
    /// which `write_all` surfaces as `WriteZero`) is fatal for the
    /// stream.
    pub async fn write_packet(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.writer
            .write_all(data)
            .await
            .map_err(|source| StreamError::PipeBroken { source })?;
        self.packets_written += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), StreamError> {
        self.writer
            .flush()
            .await
            .map_err(|source| StreamError::PipeBroken { source })
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(path: &str, args: &[&str]) -> PlayerConfig {
        PlayerConfig {
            path: PathBuf::from(path),
            args: args.iter().map(|s| s.to_string()).collect(),
            quiet: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_write_and_graceful_exit() {
        let (player, mut sink) = spawn_player(&config("cat", &[]), 64 * 1024).unwrap();

        let packet = {
            let mut p = vec![0u8; 188];
            p[0] = 0x47;
            p
        };
        sink.write_packet(&packet).await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(sink.packets_written(), 1);

        // Closing stdin lets cat exit on its own within the grace window.
        drop(sink);
        let code = player.wait_or_kill(Duration::from_secs(2)).await;
        assert_eq!(code, Some(0));
    }

    #[tokio::test]
    async fn test_grace_expiry_kills_player() {
        let (player, sink) = spawn_player(&config("sleep", &["5"]), 4096).unwrap();
        drop(sink);
        let started = std::time::Instant::now();
        let code = player.wait_or_kill(Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_secs(4));
        // Killed processes have no exit code.
        assert_eq!(code, None);
    }

    #[tokio::test]
    async fn test_spawn_missing_player_fails() {
        let result = spawn_player(&config("/nonexistent/player-binary", &[]), 4096);
        assert!(matches!(result, Err(StreamError::PlayerSpawn { .. })));
    }

    #[tokio::test]
    async fn test_try_status_reports_running_then_exited() {
        let (mut player, sink) = spawn_player(&config("cat", &[]), 4096).unwrap();
        assert!(player.try_status().unwrap().is_none());

        drop(sink); // cat exits once stdin closes
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = player.try_status().unwrap();
        assert!(status.is_some());
    }
}
