//! Session facade and the driver task that folds in the child supervisor's
//! respawn/exit handling.
//!
//! The facade is a cheap `Clone` handle — an `Arc<Inner>` wrapper, the same
//! shape as `ProcessManager`/`SessionManager` — around a channel to a
//! single background task, the "driver", that owns the queue, the read
//! buffer, and the live child exclusively. No facade method ever touches
//! that state directly; everything crosses `mpsc`/`oneshot` channels
//! instead, which is what keeps the single-active invariant true without a
//! `Mutex` on the hot path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use crate::child::{self, SpawnedChild};
use crate::codec;
use crate::config::HelperConfig;
use crate::error::SessionError;
use crate::operation::{Operation, OperationKind, OperationOutcome};
use crate::queue::OperationQueue;
use crate::reader::ReadBuffer;
use crate::state_machine::{self, FeedAction};

/// Commands sent from facade methods to the driver task.
enum DriverCommand {
    Enqueue(Operation),
    SwitchDevice {
        new_device: String,
        done: oneshot::Sender<()>,
    },
    Disconnect {
        graceful: bool,
        done: oneshot::Sender<()>,
    },
}

struct Inner {
    cmd_tx: mpsc::UnboundedSender<DriverCommand>,
    next_id: AtomicU64,
}

/// Public handle to a device session. Cheap to clone; every clone shares
/// the same driver task and child process.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Spawns the helper and starts the driver task. The first spawn
    /// failure is the one case that surfaces as a `Result` rather than
    /// resolving an operation to `None` — there is no session yet for a
    /// caller to have queued anything against.
    pub async fn connect(config: HelperConfig) -> Result<Self, SessionError> {
        let spawned = child::spawn_session_helper(&config)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = DriverState::new(config, Some(spawned));
        tokio::spawn(run_driver(cmd_rx, state));
        log::info!("session connected");
        Ok(Self {
            inner: Arc::new(Inner {
                cmd_tx,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn enqueue(
        &self,
        kind: OperationKind,
        request_line: String,
        progress_files: Vec<String>,
        item_path: Option<String>,
        verbose: bool,
        follow: Option<mpsc::UnboundedSender<String>>,
    ) -> OperationOutcome {
        let (tx, rx) = oneshot::channel();
        let op = Operation {
            id: self.next_id(),
            kind,
            request_line,
            progress_files,
            item_path,
            verbose,
            follow,
            result: tx,
        };
        if self.inner.cmd_tx.send(DriverCommand::Enqueue(op)).is_err() {
            log::warn!("driver task is gone, resolving enqueued operation as None");
            return OperationOutcome::None;
        }
        rx.await.unwrap_or(OperationOutcome::None)
    }

    pub async fn command(&self, command: String, interactive: bool) -> OperationOutcome {
        let line = codec::encode_request(
            "command",
            serde_json::json!({"command": command, "interactive": interactive}),
        );
        self.enqueue(OperationKind::Command { interactive }, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn friendly_command(&self, code: String) -> OperationOutcome {
        let line = codec::encode_request("friendly_code", serde_json::json!({"code": code}));
        self.enqueue(OperationKind::FriendlyCommand, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn retrieve_tab_comp(&self, code: String) -> OperationOutcome {
        let line = codec::encode_request("retrieve_tab_comp", serde_json::json!({"code": code}));
        self.enqueue(OperationKind::RetrieveTabComp, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn run_file(
        &self,
        files: Vec<String>,
        follow: Option<mpsc::UnboundedSender<String>>,
    ) -> OperationOutcome {
        let line = codec::encode_request("run_file", serde_json::json!({"files": files}));
        self.enqueue(OperationKind::RunFile, line, Vec::new(), None, false, follow)
            .await
    }

    pub async fn ctrl_d(&self) -> OperationOutcome {
        let line = codec::encode_request("ctrl_d", serde_json::json!({}));
        self.enqueue(OperationKind::CtrlD, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn list_contents(&self, target: String) -> OperationOutcome {
        let line = codec::encode_request("list_contents", serde_json::json!({"target": target}));
        self.enqueue(
            OperationKind::ListContents { recursive: false },
            line,
            Vec::new(),
            None,
            false,
            None,
        )
        .await
    }

    pub async fn list_contents_recursive(&self, target: String) -> OperationOutcome {
        let line = codec::encode_request(
            "list_contents_recursive",
            serde_json::json!({"target": target}),
        );
        self.enqueue(
            OperationKind::ListContents { recursive: true },
            line,
            Vec::new(),
            None,
            false,
            None,
        )
        .await
    }

    pub async fn upload_files(
        &self,
        files: Vec<String>,
        remote: String,
        local_base_dir: Option<String>,
        verbose: bool,
        follow: Option<mpsc::UnboundedSender<String>>,
    ) -> OperationOutcome {
        let mut args = serde_json::json!({"files": files, "remote": remote, "verbose": verbose});
        if let Some(dir) = &local_base_dir {
            args["local_base_dir"] = serde_json::Value::String(dir.clone());
        }
        let line = codec::encode_request("upload_files", args);
        self.enqueue(
            OperationKind::UploadFiles,
            line,
            files,
            None,
            verbose,
            follow,
        )
        .await
    }

    pub async fn download_files(
        &self,
        files: Vec<String>,
        local: String,
        verbose: bool,
        follow: Option<mpsc::UnboundedSender<String>>,
    ) -> OperationOutcome {
        let line = codec::encode_request(
            "download_files",
            serde_json::json!({"files": files, "local": local, "verbose": verbose}),
        );
        self.enqueue(
            OperationKind::DownloadFiles,
            line,
            files,
            None,
            verbose,
            follow,
        )
        .await
    }

    pub async fn delete_files(&self, files: Vec<String>) -> OperationOutcome {
        let line = codec::encode_request("delete_files", serde_json::json!({"files": files}));
        self.enqueue(OperationKind::DeleteFiles, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn create_folders(&self, folders: Vec<String>) -> OperationOutcome {
        let line = codec::encode_request("mkdirs", serde_json::json!({"folders": folders}));
        self.enqueue(OperationKind::CreateFolders, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn delete_folders(&self, folders: Vec<String>) -> OperationOutcome {
        let line = codec::encode_request("rmdirs", serde_json::json!({"folders": folders}));
        self.enqueue(OperationKind::DeleteFolders, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn delete_folder_recursive(&self, folders: Vec<String>) -> OperationOutcome {
        let line = codec::encode_request("rmtree", serde_json::json!({"folders": folders}));
        self.enqueue(
            OperationKind::DeleteFolderRecursive,
            line,
            Vec::new(),
            None,
            false,
            None,
        )
        .await
    }

    pub async fn delete_file_or_folder(&self, target: String, recursive: bool) -> OperationOutcome {
        let line = codec::encode_request(
            "rm_file_or_dir",
            serde_json::json!({"target": target, "recursive": recursive}),
        );
        self.enqueue(
            OperationKind::DeleteFileOrFolder,
            line,
            Vec::new(),
            None,
            false,
            None,
        )
        .await
    }

    /// Internal: parses the helper's per-file hash response. Never exposed
    /// directly as a typed `OperationOutcome::HashMap` variant to external
    /// callers; `project_sync::upload_project` is the only caller.
    pub(crate) async fn calc_hashes(&self, files: Vec<String>) -> HashMap<String, String> {
        let line = codec::encode_request("calc_file_hashes", serde_json::json!({"files": files}));
        match self
            .enqueue(OperationKind::CalcHashes, line, Vec::new(), None, false, None)
            .await
        {
            OperationOutcome::HashMap { hashes } => hashes,
            _ => HashMap::new(),
        }
    }

    pub async fn get_item_stat(&self, item: String) -> OperationOutcome {
        let line = codec::encode_request("get_item_stat", serde_json::json!({"item": item}));
        self.enqueue(
            OperationKind::GetItemStat,
            line,
            Vec::new(),
            Some(item),
            false,
            None,
        )
        .await
    }

    pub async fn rename_item(&self, item: String, target: String) -> OperationOutcome {
        let line = codec::encode_request("rename", serde_json::json!({"item": item, "target": target}));
        self.enqueue(OperationKind::RenameItem, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn sync_rtc(&self) -> OperationOutcome {
        let line = codec::encode_request("sync_rtc", serde_json::json!({}));
        self.enqueue(OperationKind::SyncRtc, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn get_rtc_time(&self) -> OperationOutcome {
        let line = codec::encode_request("get_rtc_time", serde_json::json!({}));
        self.enqueue(OperationKind::GetRtcTime, line, Vec::new(), None, false, None)
            .await
    }

    /// A no-op if the queue is non-empty: implemented by resolving `None`
    /// without enqueueing when the driver already has work pending, rather
    /// than piling redundant status polls behind a busy session.
    pub async fn check_status(&self) -> OperationOutcome {
        let line = codec::encode_request("status", serde_json::json!({}));
        self.enqueue(OperationKind::CheckStatus, line, Vec::new(), None, false, None)
            .await
    }

    pub async fn soft_reset(&self, verbose: bool) -> OperationOutcome {
        let line = codec::encode_request("soft_reset", serde_json::json!({}));
        self.enqueue(
            OperationKind::SoftReset { verbose },
            line,
            Vec::new(),
            None,
            verbose,
            None,
        )
        .await
    }

    pub async fn hard_reset(&self, follow: Option<mpsc::UnboundedSender<String>>) -> OperationOutcome {
        let line = codec::encode_request("hard_reset", serde_json::json!({}));
        let has_follow = follow.is_some();
        self.enqueue(
            OperationKind::HardReset { follow: has_follow },
            line,
            Vec::new(),
            None,
            false,
            follow,
        )
        .await
    }

    pub async fn exit(&self) -> OperationOutcome {
        let line = codec::encode_request("exit", serde_json::json!({}));
        self.enqueue(OperationKind::Exit, line, Vec::new(), None, false, None)
            .await
    }

    /// Tears down the current child (graceful exit, then kill if still
    /// alive), empties the queue resolving every waiter with `None`, and
    /// respawns against `new_device`.
    pub async fn switch_device(&self, new_device: String) {
        let (tx, rx) = oneshot::channel();
        if self
            .inner
            .cmd_tx
            .send(DriverCommand::SwitchDevice {
                new_device,
                done: tx,
            })
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// `graceful=true`: enqueues an `exit` request, waits the configured
    /// grace period, then kills if still alive. `graceful=false`: kills
    /// immediately. Either way, every queued and active waiter resolves
    /// `None` and no waiter is left parked.
    pub async fn disconnect(&self, graceful: bool) {
        let (tx, rx) = oneshot::channel();
        if self
            .inner
            .cmd_tx
            .send(DriverCommand::Disconnect { graceful, done: tx })
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// One-shot port scan: spawns its own helper process,
/// entirely independent of any `Session`'s driver/queue, reads until
/// `!!EOO!!`, then kills the child.
pub async fn scan_ports(config: &HelperConfig) -> OperationOutcome {
    let mut spawned = match child::spawn_scan_ports_helper(config) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("scan_ports spawn failed: {e}");
            return OperationOutcome::None;
        }
    };

    let mut buffer = ReadBuffer::new();
    loop {
        tokio::select! {
            chunk = spawned.stdout_rx.recv() => {
                match chunk {
                    Some(bytes) => {
                        buffer.push(&bytes);
                        if buffer.as_str().contains(codec::EOO) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = spawned.child.wait() => break,
        }
    }

    let cleaned = codec::strip_eoo(buffer.as_str());
    let ports: Vec<String> = cleaned
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let _ = spawned.child.start_kill();
    let _ = spawned.child.wait().await;

    OperationOutcome::PortsScan { ports }
}

// ---------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------

struct DriverState {
    config: HelperConfig,
    current: Option<SpawnedChild>,
    connected: bool,
    queue: OperationQueue,
    buffer: ReadBuffer,
    /// Stashed between a `hardReset` request being written and the
    /// respawn that resolves it — survives the child's exit.
    hard_reset_waiter: Option<Operation>,
    /// Whether the post-respawn `--listen` banner stream should be
    /// forwarded, and to whom, until the first `!!EOO!!`.
    listen_forward: Option<mpsc::UnboundedSender<String>>,
    listen_buffer: ReadBuffer,
}

impl DriverState {
    fn new(config: HelperConfig, current: Option<SpawnedChild>) -> Self {
        Self {
            config,
            connected: current.is_some(),
            current,
            queue: OperationQueue::new(),
            buffer: ReadBuffer::new(),
            hard_reset_waiter: None,
            listen_forward: None,
            listen_buffer: ReadBuffer::new(),
        }
    }
}

async fn run_driver(mut cmd_rx: mpsc::UnboundedReceiver<DriverCommand>, mut state: DriverState) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(c) => handle_command(c, &mut state).await,
                    None => break,
                }
            }
            chunk = recv_stdout(state.current.as_mut()) => {
                if let Some(chunk) = chunk {
                    handle_stdout_chunk(chunk, &mut state).await;
                }
            }
            status = wait_child(state.current.as_mut()) => {
                handle_child_exit(status, &mut state).await;
            }
        }
    }

    if let Some(mut spawned) = state.current.take() {
        let _ = spawned.child.start_kill();
        let _ = spawned.child.wait().await;
    }
    state.queue.cancel_all();
    log::info!("session driver exiting");
}

async fn recv_stdout(child: Option<&mut SpawnedChild>) -> Option<Vec<u8>> {
    match child {
        Some(c) => c.stdout_rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_child(child: Option<&mut SpawnedChild>) -> std::io::Result<std::process::ExitStatus> {
    match child {
        Some(c) => c.child.wait().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(cmd: DriverCommand, state: &mut DriverState) {
    match cmd {
        DriverCommand::Enqueue(op) => handle_enqueue(op, state).await,
        DriverCommand::SwitchDevice { new_device, done } => {
            switch_device(state, new_device).await;
            let _ = done.send(());
        }
        DriverCommand::Disconnect { graceful, done } => {
            disconnect(state, graceful).await;
            let _ = done.send(());
        }
    }
}

async fn handle_enqueue(op: Operation, state: &mut DriverState) {
    if !state.connected {
        let outcome = if matches!(op.kind, OperationKind::SyncRtc) {
            OperationOutcome::Status { ok: false }
        } else {
            OperationOutcome::None
        };
        let _ = op.result.send(outcome);
        return;
    }
    if matches!(op.kind, OperationKind::CheckStatus) && !state.queue.is_empty() {
        let _ = op.result.send(OperationOutcome::None);
        return;
    }
    state.queue.enqueue(op);
    try_activate_next(state).await;
}

/// Drains and activates operations until one needs to wait on stdout (or
/// the queue empties). `Exit` resolves immediately without a reply;
/// `HardReset` is stashed rather than completed here.
async fn try_activate_next(state: &mut DriverState) {
    loop {
        if state.queue.has_active() {
            return;
        }
        if state.hard_reset_waiter.is_some() {
            // The child is mid-exit/respawn; anything drained now would be
            // written to the exiting process. Wait for `handle_child_exit`
            // to respawn and re-drive activation.
            return;
        }
        let (kind, request_line) = match state.queue.drain_next() {
            Some(op) => (op.kind.clone(), op.request_line.clone()),
            None => return,
        };
        state.buffer.clear();

        if let Err(e) = write_request(state, &request_line).await {
            log::warn!("write to helper failed, resolving None: {e}");
            if let Some(op) = state.queue.complete_active() {
                let _ = op.result.send(OperationOutcome::None);
            }
            continue;
        }

        match kind {
            OperationKind::Exit => {
                if let Some(op) = state.queue.complete_active() {
                    let _ = op.result.send(OperationOutcome::None);
                }
                continue;
            }
            OperationKind::HardReset { .. } => {
                let op = state
                    .queue
                    .complete_active()
                    .expect("operation was just activated");
                state.hard_reset_waiter = Some(op);
                return;
            }
            _ => return,
        }
    }
}

async fn write_request(state: &mut DriverState, line: &str) -> std::io::Result<()> {
    let spawned = state
        .current
        .as_mut()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "no live helper"))?;
    spawned.stdin.write_all(line.as_bytes()).await?;
    spawned.stdin.flush().await
}

async fn handle_stdout_chunk(chunk: Vec<u8>, state: &mut DriverState) {
    if state.queue.active().is_none() {
        if let Some(tx) = state.listen_forward.clone() {
            state.listen_buffer.push(&chunk);
            let text = state.listen_buffer.as_str().to_string();
            if text.contains(codec::EOO) {
                let cleaned = codec::strip_eoo(&text);
                if !cleaned.is_empty() {
                    let _ = tx.send(cleaned.to_string());
                }
                state.listen_forward = None;
                state.listen_buffer.clear();
            } else if !text.is_empty() {
                let _ = tx.send(text);
                state.listen_buffer.clear();
            }
        }
        return;
    }

    let had_newline = state.buffer.push(&chunk);
    let (kind, verbose, progress_files, has_progress_cb, item_path) = {
        let op = match state.queue.active() {
            Some(op) => op,
            None => return,
        };
        (
            op.kind.clone(),
            op.verbose,
            op.progress_files.clone(),
            op.follow.is_some(),
            op.item_path.clone(),
        )
    };

    if !(had_newline || kind.streams_without_newline()) {
        return;
    }

    let action = state_machine::feed(
        &kind,
        &mut state.buffer,
        verbose,
        &progress_files,
        has_progress_cb,
        item_path.as_deref(),
    );

    match action {
        FeedAction::Continue => {}
        FeedAction::WriteNewline => {
            if let Err(e) = write_request(state, "\n").await {
                log::warn!("failed to write sentinel newline: {e}");
            }
        }
        FeedAction::Progress(msg) => {
            if let Some(op) = state.queue.active() {
                if let Some(tx) = &op.follow {
                    let _ = tx.send(msg);
                }
            }
        }
        FeedAction::Complete(outcome) => {
            if let Some(op) = state.queue.complete_active() {
                let _ = op.result.send(outcome);
            }
            state.buffer.clear();
            try_activate_next(state).await;
        }
        FeedAction::CompleteWithFollow(msg) => {
            if let Some(op) = state.queue.complete_active() {
                if let Some(tx) = &op.follow {
                    let _ = tx.send(msg);
                }
                let _ = op.result.send(OperationOutcome::CommandResult { ok: true });
            }
            state.buffer.clear();
            try_activate_next(state).await;
        }
        FeedAction::ForceDisconnect(outcome) => {
            if let Some(op) = state.queue.complete_active() {
                let _ = op.result.send(outcome);
            }
            force_disconnect(state).await;
        }
        FeedAction::SyntheticException => {
            if let Some(op) = state.queue.complete_active() {
                let _ = op.result.send(OperationOutcome::Status { ok: false });
            }
            log::warn!("device output contained \"Exception\" mid-stream, forcing disconnect");
            force_disconnect(state).await;
        }
    }
}

async fn handle_child_exit(status: std::io::Result<std::process::ExitStatus>, state: &mut DriverState) {
    state.current = None;

    if let Some(op) = state.hard_reset_waiter.take() {
        let follow = op.follow.clone();
        let want_listen = matches!(op.kind, OperationKind::HardReset { follow: true });
        match child::spawn_hard_reset_helper(&state.config, want_listen) {
            Ok(spawned) => {
                state.current = Some(spawned);
                state.connected = true;
                state.buffer.clear();
                if want_listen {
                    state.listen_forward = follow;
                    state.listen_buffer.clear();
                }
                let _ = op.result.send(OperationOutcome::CommandResult { ok: true });
                try_activate_next(state).await;
            }
            Err(e) => {
                log::warn!("respawn after hard reset failed: {e}");
                let _ = op.result.send(OperationOutcome::CommandResult { ok: false });
                state.connected = false;
                state.queue.cancel_all();
            }
        }
        return;
    }

    match status {
        Ok(s) => log::warn!("helper exited unexpectedly: {s}"),
        Err(e) => log::warn!("error waiting on helper: {e}"),
    }
    state.connected = false;
    state.queue.cancel_all();
}

async fn switch_device(state: &mut DriverState, new_device: String) {
    if state.connected {
        let _ = write_request(state, &codec::encode_request("exit", serde_json::json!({}))).await;
        if let Some(spawned) = state.current.as_mut() {
            child::kill_with_grace(&mut spawned.child, state.config.disconnect_grace).await;
        }
    }
    state.current = None;
    state.connected = false;
    state.hard_reset_waiter = None;
    state.listen_forward = None;
    state.buffer.clear();
    state.queue.cancel_all();

    state.config.device = new_device;
    match child::spawn_session_helper(&state.config) {
        Ok(spawned) => {
            state.current = Some(spawned);
            state.connected = true;
            log::info!("switched device to {}", state.config.device);
        }
        Err(e) => {
            log::warn!("failed to spawn helper for new device {}: {e}", state.config.device);
        }
    }
}

async fn disconnect(state: &mut DriverState, graceful: bool) {
    if !state.connected {
        return;
    }
    if graceful {
        let _ = write_request(state, &codec::encode_request("exit", serde_json::json!({}))).await;
        if let Some(spawned) = state.current.as_mut() {
            child::kill_with_grace(&mut spawned.child, state.config.disconnect_grace).await;
        }
    } else if let Some(spawned) = state.current.as_mut() {
        let _ = spawned.child.start_kill();
        let _ = spawned.child.wait().await;
    }
    state.current = None;
    state.connected = false;
    state.hard_reset_waiter = None;
    state.listen_forward = None;
    state.queue.cancel_all();
}

async fn force_disconnect(state: &mut DriverState) {
    if let Some(spawned) = state.current.as_mut() {
        let _ = spawned.child.start_kill();
        let _ = spawned.child.wait().await;
    }
    state.current = None;
    state.connected = false;
    state.hard_reset_waiter = None;
    state.listen_forward = None;
    state.queue.cancel_all();
}
