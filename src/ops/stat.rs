//! `getItemStat` and `renameItem` parsing.

use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::codec::ERR;
use crate::operation::FileRecord;

#[derive(Debug, Deserialize)]
struct StatFrame {
    creation_time: i64,
    modification_time: i64,
    size: u64,
    is_dir: bool,
}

/// Parses a stat response for the given requested path. Returns `None` if
/// the buffer carries `!!ERR!!` or fails to parse as the stat frame shape.
/// Epoch-second timestamps from the wire are converted to millisecond
/// precision (`* 1000`).
pub fn parse_item_stat(payload: &str, path: &str) -> Option<FileRecord> {
    if payload.contains(ERR) {
        return None;
    }
    let cleaned = payload.replace(['\r', '\n'], "");
    let frame: StatFrame = serde_json::from_str(cleaned.trim()).ok()?;
    Some(FileRecord {
        path: path.to_string(),
        is_dir: frame.is_dir,
        size: frame.size,
        last_modified: epoch_seconds_to_millis(frame.modification_time),
        created: epoch_seconds_to_millis(frame.creation_time),
    })
}

fn epoch_seconds_to_millis(epoch_seconds: i64) -> Option<chrono::DateTime<Utc>> {
    Utc.timestamp_millis_opt(epoch_seconds * 1000).single()
}

#[derive(Debug, Deserialize)]
struct RenameFrame {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Parses `{success, error?}` into the `ok` flag, logging a warning when
/// the helper reported `success=false`.
pub fn parse_rename_result(payload: &str) -> bool {
    match serde_json::from_str::<RenameFrame>(payload.trim()) {
        Ok(frame) => {
            if !frame.success {
                log::warn!(
                    "rename reported failure: {}",
                    frame.error.as_deref().unwrap_or("<no error message>")
                );
            }
            frame.success
        }
        Err(e) => {
            log::warn!("malformed rename response: {e}");
            false
        }
    }
}
