//! Spawns the helper subprocess in its three modes (interactive session,
//! one-shot port scan, post-reset respawn) and owns its piped stdio.
//!
//! Generalizes `core::process_manager::ProcessManager`'s spawn/reader-thread
//! shape from a PTY master/slave pair to a plain piped
//! `tokio::process::Child`: stdout is drained by a dedicated tokio task into
//! a bounded channel instead of an OS reader thread, since there is no PTY
//! fd to block an OS thread on here.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::config::HelperConfig;
use crate::error::SessionError;

/// Size of the channel between the stdout-reading task and the driver.
/// Matches the PTY reader's channel depth (`~1 MB of 4 KB chunks`).
const STDOUT_CHANNEL_DEPTH: usize = 256;
const READ_CHUNK_SIZE: usize = 4096;

/// A freshly spawned helper process plus the channel its stdout is drained
/// into. The driver (`session.rs`) owns this for the lifetime of the child.
pub struct SpawnedChild {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout_rx: mpsc::Receiver<Vec<u8>>,
}

/// Spawns the helper in interactive mode: `-d <device> -b <baud>`.
pub fn spawn_session_helper(config: &HelperConfig) -> Result<SpawnedChild, SessionError> {
    let mut cmd = base_command(config);
    cmd.arg("-d").arg(&config.device).arg("-b").arg(config.baud.to_string());
    spawn(cmd, &config.helper_path)
}

/// Spawns the helper in one-shot port-scan mode: `--scan-ports`. Does not take a device id.
pub fn spawn_scan_ports_helper(config: &HelperConfig) -> Result<SpawnedChild, SessionError> {
    let mut cmd = base_command(config);
    cmd.arg("--scan-ports");
    spawn(cmd, &config.helper_path)
}

/// Spawns the respawn-after-`hardReset` helper, optionally in `--listen`
/// mode so post-reset boot output can be forwarded to a follow callback.
pub fn spawn_hard_reset_helper(
    config: &HelperConfig,
    follow: bool,
) -> Result<SpawnedChild, SessionError> {
    let mut cmd = base_command(config);
    cmd.arg("-d").arg(&config.device).arg("-b").arg(config.baud.to_string());
    if follow {
        cmd.arg("--listen");
    }
    spawn(cmd, &config.helper_path)
}

fn base_command(config: &HelperConfig) -> Command {
    let mut cmd = Command::new(&config.helper_path);
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn spawn(mut cmd: Command, helper_path: &std::path::Path) -> Result<SpawnedChild, SessionError> {
    let mut child = cmd.spawn().map_err(|source| SessionError::Spawn {
        path: helper_path.to_path_buf(),
        source,
    })?;

    let stdin = child.stdin.take().ok_or(SessionError::StdinUnavailable)?;
    let stdout = child.stdout.take().ok_or(SessionError::StdoutUnavailable)?;
    let stderr = child.stderr.take();

    let stdout_rx = spawn_stdout_reader(stdout);
    if let Some(stderr) = stderr {
        spawn_stderr_forwarder(stderr);
    }

    log::info!("spawned helper pid={:?}", child.id());

    Ok(SpawnedChild {
        child,
        stdin,
        stdout_rx,
    })
}

/// Drains the helper's stdout into a bounded channel of raw chunks; the
/// driver decodes them against its own `ReadBuffer`/`Utf8Decoder` so a
/// split multi-byte sequence at a chunk boundary is handled exactly once,
/// in one place.
fn spawn_stdout_reader(mut stdout: tokio::process::ChildStdout) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(STDOUT_CHANNEL_DEPTH);
    tokio::spawn(async move {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("helper stdout read error: {e}");
                    break;
                }
            }
        }
        log::debug!("helper stdout reader exited");
    });
    rx
}

/// Forwards helper stderr line-by-line to `log::warn!`.
fn spawn_stderr_forwarder(stderr: tokio::process::ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => log::warn!("helper stderr: {line}"),
                Ok(None) => break,
                Err(e) => {
                    log::debug!("helper stderr read error: {e}");
                    break;
                }
            }
        }
    });
}

/// Kills a child, escalating from a polite request to a forced kill if it
/// does not exit within `grace`. Used by `disconnect`/`switch_device` once
/// a graceful `exit` write has already been attempted by the caller.
pub async fn kill_with_grace(child: &mut Child, grace: std::time::Duration) {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => log::debug!("helper exited during grace period: {status}"),
        Ok(Err(e)) => log::warn!("error waiting for helper exit: {e}"),
        Err(_) => {
            log::warn!("helper did not exit within grace period, killing");
            if let Err(e) = child.start_kill() {
                log::warn!("failed to kill helper: {e}");
            }
            let _ = child.wait().await;
        }
    }
}
