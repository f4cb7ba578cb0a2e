//! `listContents` / `listContentsRecursive` parsing.

use crate::operation::FileRecord;

/// Parses a cleaned buffer (terminator already stripped) into file
/// records. Lines that don't split into exactly `[size, path]` on the
/// first space after left-trimming are skipped; `\r` is stripped first.
pub fn parse_list_contents(buffer: &str) -> Vec<FileRecord> {
    buffer
        .split('\n')
        .filter_map(|raw| {
            let line = raw.replace('\r', "");
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                return None;
            }
            let mut parts = trimmed.splitn(2, ' ');
            let size_field = parts.next()?;
            let path = parts.next()?;
            if path.is_empty() {
                return None;
            }
            let size: u64 = size_field.parse().ok()?;
            let is_dir = path.ends_with('/');
            Some(FileRecord::new(path.to_string(), is_dir, size))
        })
        .collect()
}
