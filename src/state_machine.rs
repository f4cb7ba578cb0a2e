//! Operation State Machine: dispatches each active operation's buffer to
//! its kind-specific parsing contract.
//!
//! This module exposes one `feed` entry point keyed on `OperationKind`;
//! the session driver owns the single active operation and calls `feed`
//! each time the reader decides the consumer should run.

use crate::codec::{self, ERR, EOO};
use crate::ops::{command, fs_mutation, hashes, listing, stat, status};
use crate::operation::{OperationKind, OperationOutcome};
use crate::reader::ReadBuffer;

/// What the driver should do after a `feed` call.
pub enum FeedAction {
    /// Keep waiting; no terminator seen yet.
    Continue,
    /// Strip `!!__SENTINEL__!!` from the buffer and write a `\n` to the
    /// helper's stdin to unblock its blocking read.
    WriteNewline,
    /// The operation is done; resolve the caller's waiter with this
    /// outcome.
    Complete(OperationOutcome),
    /// A command-like operation completed with a progress callback
    /// attached: forward the cleaned buffer on the follow channel, then
    /// resolve the caller's waiter with `CommandResult{ok:true}`.
    CompleteWithFollow(String),
    /// `!!ERR!!` appeared in a command-like stream: disconnect, then
    /// resolve with this outcome.
    ForceDisconnect(OperationOutcome),
    /// `checkStatus` saw `"Exception"` mid-stream: force a synthetic exit
    /// with code 3.
    SyntheticException,
    /// A verbose fs-mutation progress frame was parsed; forward this
    /// message on the operation's progress channel, then keep waiting.
    Progress(String),
}

/// Advances the state machine for the active operation's kind given its
/// accumulated buffer. `verbose`/`progress_files` are only consulted for
/// fs-mutation kinds; `progress` receives formatted progress strings.
pub fn feed(
    kind: &OperationKind,
    buffer: &mut ReadBuffer,
    verbose: bool,
    progress_files: &[String],
    has_progress_callback: bool,
    item_path: Option<&str>,
) -> FeedAction {
    if buffer.as_str().contains(codec::SENTINEL) {
        buffer.remove_token(codec::SENTINEL);
        return FeedAction::WriteNewline;
    }

    if kind.is_command_like() {
        return feed_command_like(kind, buffer, has_progress_callback);
    }

    match kind {
        OperationKind::ListContents { .. } => feed_list_contents(buffer),
        OperationKind::CalcHashes => feed_calc_hashes(buffer),
        OperationKind::GetItemStat => feed_get_item_stat(buffer, item_path.unwrap_or("")),
        OperationKind::RenameItem => feed_rename_item(buffer),
        OperationKind::GetRtcTime => feed_get_rtc_time(buffer),
        OperationKind::CheckStatus => feed_check_status(buffer),
        OperationKind::SoftReset { verbose } => feed_soft_reset(buffer, *verbose),
        _ if kind.is_fs_mutation() => {
            feed_fs_mutation(buffer, verbose, progress_files, has_progress_callback)
        }
        // HardReset, Exit, ScanPorts, CtrlD(handled above) are driven
        // outside the generic buffer-feed loop (see `session.rs`).
        _ => FeedAction::Continue,
    }
}

fn feed_command_like(kind: &OperationKind, buffer: &mut ReadBuffer, has_progress_callback: bool) -> FeedAction {
    let text = buffer.as_str();
    if text.contains(ERR) {
        let cleaned = codec::strip_eoo(text).replace(ERR, "");
        return FeedAction::ForceDisconnect(OperationOutcome::CommandWithResponse {
            response: cleaned,
        });
    }
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    let cleaned = codec::strip_eoo(text).to_string();

    if matches!(kind, OperationKind::RetrieveTabComp) {
        return FeedAction::Complete(command::tab_completion_outcome(&cleaned));
    }

    if has_progress_callback {
        return FeedAction::CompleteWithFollow(cleaned);
    }

    FeedAction::Complete(OperationOutcome::CommandWithResponse { response: cleaned })
}

fn feed_list_contents(buffer: &mut ReadBuffer) -> FeedAction {
    let text = buffer.as_str();
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    let cleaned = codec::strip_eoo(text);
    let files = listing::parse_list_contents(cleaned);
    FeedAction::Complete(OperationOutcome::ListContents { files })
}

fn feed_fs_mutation(
    buffer: &mut ReadBuffer,
    verbose: bool,
    progress_files: &[String],
    has_progress_callback: bool,
) -> FeedAction {
    let text = buffer.as_str();
    if text.contains(EOO) {
        let payload = codec::strip_eoo(text);
        let ok = fs_mutation::is_success(payload);
        return FeedAction::Complete(OperationOutcome::Status { ok });
    }

    if text.contains(ERR) || text.contains("!!Exception!!") {
        buffer.clear();
        return FeedAction::Continue;
    }

    if verbose && has_progress_callback && !text.trim().is_empty() {
        match serde_json::from_str::<fs_mutation::ProgressFrame>(text.trim()) {
            Ok(frame) => {
                let msg = fs_mutation::format_progress_message(&frame, progress_files);
                buffer.clear();
                return FeedAction::Progress(msg);
            }
            Err(e) => {
                log::debug!("malformed progress frame, discarding: {e}");
                buffer.clear();
                return FeedAction::Continue;
            }
        }
    }

    FeedAction::Continue
}

fn feed_calc_hashes(buffer: &mut ReadBuffer) -> FeedAction {
    let text = buffer.as_str();
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    let cleaned = codec::strip_eoo(text);
    FeedAction::Complete(OperationOutcome::HashMap {
        hashes: hashes::parse_hash_frames(cleaned),
    })
}

fn feed_get_item_stat(buffer: &mut ReadBuffer, item_path: &str) -> FeedAction {
    let text = buffer.as_str();
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    let payload = codec::strip_eoo(text);
    FeedAction::Complete(OperationOutcome::GetItemStat {
        stat: if payload.contains(ERR) {
            None
        } else {
            stat::parse_item_stat(payload, item_path)
        },
    })
}

fn feed_rename_item(buffer: &mut ReadBuffer) -> FeedAction {
    let text = buffer.as_str();
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    let payload = codec::strip_eoo(text);
    FeedAction::Complete(OperationOutcome::Status {
        ok: stat::parse_rename_result(payload),
    })
}

fn feed_get_rtc_time(buffer: &mut ReadBuffer) -> FeedAction {
    let text = buffer.as_str();
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    let payload = codec::strip_eoo(text);
    let time = if payload.contains(ERR) {
        None
    } else {
        crate::rtc::parse_wire_tuple(payload)
    };
    FeedAction::Complete(OperationOutcome::RtcTime { time })
}

fn feed_check_status(buffer: &mut ReadBuffer) -> FeedAction {
    let text = buffer.as_str();
    if status::saw_exception_mid_stream(text) && !text.contains(EOO) {
        return FeedAction::SyntheticException;
    }
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    FeedAction::Complete(OperationOutcome::Status {
        ok: status::check_status_ok(text),
    })
}

fn feed_soft_reset(buffer: &mut ReadBuffer, verbose: bool) -> FeedAction {
    let text = buffer.as_str();
    if !text.contains(EOO) {
        return FeedAction::Continue;
    }
    if verbose {
        FeedAction::Complete(OperationOutcome::CommandWithResponse {
            response: status::soft_reset_response(text),
        })
    } else {
        FeedAction::Complete(OperationOutcome::CommandResult {
            ok: status::soft_reset_ok(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(s: &str) -> ReadBuffer {
        let mut b = ReadBuffer::new();
        b.push(s.as_bytes());
        b
    }

    #[test]
    fn sentinel_anywhere_yields_write_newline() {
        let mut buffer = buf("partial output !!__SENTINEL__!!");
        let action = feed(&OperationKind::RunFile, &mut buffer, false, &[], false, None);
        assert!(matches!(action, FeedAction::WriteNewline));
        assert!(!buffer.as_str().contains(codec::SENTINEL));
    }

    #[test]
    fn command_like_waits_for_eoo() {
        let mut buffer = buf("no terminator yet");
        let action = feed(&OperationKind::FriendlyCommand, &mut buffer, false, &[], false, None);
        assert!(matches!(action, FeedAction::Continue));
    }

    #[test]
    fn command_like_err_forces_disconnect() {
        let mut buffer = buf("boom\n!!ERR!!");
        let action = feed(
            &OperationKind::Command { interactive: false },
            &mut buffer,
            false,
            &[],
            false,
            None,
        );
        match action {
            FeedAction::ForceDisconnect(OperationOutcome::CommandWithResponse { response }) => {
                assert_eq!(response, "boom\n");
            }
            _ => panic!("expected ForceDisconnect"),
        }
    }

    #[test]
    fn run_file_with_follow_completes_via_follow_channel() {
        let mut buffer = buf("line one\nline two\n!!EOO!!\n");
        let action = feed(&OperationKind::RunFile, &mut buffer, false, &[], true, None);
        match action {
            FeedAction::CompleteWithFollow(msg) => assert_eq!(msg, "line one\nline two\n"),
            _ => panic!("expected CompleteWithFollow"),
        }
    }

    #[test]
    fn retrieve_tab_comp_dispatches_to_tab_completion_outcome() {
        let mut buffer = buf("!!SIMPLE_AUTO_COMP!!uos.listdir\n!!EOO!!\n");
        let action = feed(&OperationKind::RetrieveTabComp, &mut buffer, false, &[], false, None);
        match action {
            FeedAction::Complete(OperationOutcome::TabComp { is_simple, completion }) => {
                assert!(is_simple);
                assert_eq!(completion, "uos.listdir");
            }
            _ => panic!("expected Complete(TabComp)"),
        }
    }

    #[test]
    fn calc_hashes_completes_with_hash_map_outcome() {
        let mut buffer = buf("{\"file\":\"a.py\",\"hash\":\"H1\"}\n!!EOO!!\n");
        let action = feed(&OperationKind::CalcHashes, &mut buffer, false, &[], false, None);
        match action {
            FeedAction::Complete(OperationOutcome::HashMap { hashes }) => {
                assert_eq!(hashes.get("a.py").unwrap(), "H1");
            }
            _ => panic!("expected Complete(HashMap)"),
        }
    }

    #[test]
    fn get_item_stat_threads_item_path_into_result() {
        let mut buffer = buf(
            "{\"creation_time\": 1000, \"modification_time\": 2000, \"size\": 12, \"is_dir\": false}\n!!EOO!!\n",
        );
        let action = feed(
            &OperationKind::GetItemStat,
            &mut buffer,
            false,
            &[],
            false,
            Some("/main.py"),
        );
        match action {
            FeedAction::Complete(OperationOutcome::GetItemStat { stat: Some(record) }) => {
                assert_eq!(record.path, "/main.py");
                assert_eq!(record.size, 12);
            }
            _ => panic!("expected Complete(GetItemStat) with a record"),
        }
    }

    #[test]
    fn get_item_stat_err_yields_no_stat() {
        let mut buffer = buf("!!ERR!!\n!!EOO!!\n");
        let action = feed(&OperationKind::GetItemStat, &mut buffer, false, &[], false, Some("/x"));
        assert!(matches!(
            action,
            FeedAction::Complete(OperationOutcome::GetItemStat { stat: None })
        ));
    }

    #[test]
    fn fs_mutation_emits_progress_then_completes() {
        let files = vec!["/a.py".to_string()];
        let mut buffer = buf("{\"written\": 1, \"total\": 2, \"currentFilePos\": 1, \"totalFilesCount\": 1}");
        let action = feed(&OperationKind::UploadFiles, &mut buffer, true, &files, true, None);
        match action {
            FeedAction::Progress(msg) => assert_eq!(msg, "'/a.py' [1/1]"),
            _ => panic!("expected Progress"),
        }

        let mut buffer = buf("done\n!!EOO!!\n");
        let action = feed(&OperationKind::UploadFiles, &mut buffer, false, &[], false, None);
        assert!(matches!(
            action,
            FeedAction::Complete(OperationOutcome::Status { ok: true })
        ));
    }

    #[test]
    fn check_status_mid_stream_exception_triggers_synthetic_exit() {
        let mut buffer = buf("Traceback\nException: boom\n");
        let action = feed(&OperationKind::CheckStatus, &mut buffer, false, &[], false, None);
        assert!(matches!(action, FeedAction::SyntheticException));
    }

    #[test]
    fn soft_reset_verbose_echoes_response() {
        let mut buffer = buf("booted ok\n!!EOO!!\n");
        let action = feed(
            &OperationKind::SoftReset { verbose: true },
            &mut buffer,
            false,
            &[],
            false,
            None,
        );
        match action {
            FeedAction::Complete(OperationOutcome::CommandWithResponse { response }) => {
                assert_eq!(response, "booted ok");
            }
            _ => panic!("expected Complete(CommandWithResponse)"),
        }
    }
}
