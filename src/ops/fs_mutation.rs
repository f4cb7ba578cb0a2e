//! Shared parsing for the fs-mutation kinds: `uploadFiles`, `downloadFiles`,
//! `deleteFiles`, `createFolders`, `deleteFolders`, `deleteFolderRecursive`,
//! `deleteFileOrFolder`, `syncRtc`.

use serde::Deserialize;

use crate::codec::ERR;

/// One `verbose` progress frame: `{written, total, currentFilePos,
/// totalFilesCount}`.
#[derive(Debug, Deserialize)]
pub struct ProgressFrame {
    #[allow(dead_code)]
    pub written: u64,
    #[allow(dead_code)]
    pub total: u64,
    #[serde(rename = "currentFilePos")]
    pub current_file_pos: u64,
    #[serde(rename = "totalFilesCount")]
    pub total_files_count: u64,
}

/// `Status{ok = (buffer has no !!ERR!!) OR (buffer contains "EXIST")}` — the
/// "already existed" carve-out treats a preamble failure as success.
pub fn is_success(payload: &str) -> bool {
    !payload.contains(ERR) || payload.contains("EXIST")
}

/// Formats the progress message `"'<name>' [<pos>/<total>]"` for a frame,
/// looking the display name up in the request's file list by
/// `currentFilePos - 1`.
pub fn format_progress_message(frame: &ProgressFrame, files: &[String]) -> String {
    let idx = frame.current_file_pos.saturating_sub(1) as usize;
    let name = files.get(idx).map(String::as_str).unwrap_or("?");
    format!("'{}' [{}/{}]", name, frame.current_file_pos, frame.total_files_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exist_carve_out_counts_as_success() {
        assert!(is_success("mkdir: EXIST\n!!ERR!!\n"));
    }

    #[test]
    fn plain_err_is_failure() {
        assert!(!is_success("boom\n!!ERR!!\n"));
    }

    #[test]
    fn clean_payload_is_success() {
        assert!(is_success("all good\n"));
    }

    #[test]
    fn formats_progress_message() {
        let frame = ProgressFrame {
            written: 50,
            total: 100,
            current_file_pos: 1,
            total_files_count: 2,
        };
        let files = vec!["/a.py".to_string(), "/b.py".to_string()];
        assert_eq!(format_progress_message(&frame, &files), "'/a.py' [1/2]");
    }
}
