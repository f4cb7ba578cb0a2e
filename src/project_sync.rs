//! Project sync: hash-diff driver that chains `calcHashes` into
//! `uploadFiles`.
//!
//! Local file discovery/hashing is assumed to be supplied by the caller in
//! the general case, but this crate has no host application to supply it,
//! so a conforming default is provided here using `sha2`/`hex` (already
//! pulled in via `core::mcp_status_monitor::generate_project_hash`'s
//! hashing) and `walkdir` for the directory walk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc::UnboundedSender;

use crate::operation::OperationOutcome;
use crate::session::Session;

/// Replaces backslashes and collapses doubled forward slashes, matching the
/// source's `startUploadingProject` path normalization.
pub fn normalize_remote_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let mut normalized = String::with_capacity(replaced.len());
    let mut last_was_slash = false;
    for c in replaced.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        normalized.push(c);
    }
    normalized
}

/// Recursively scans `root`, hashing every file whose extension is in
/// `allow_ext` (or every file, if `allow_ext` is empty) and whose
/// root-relative path is not in `ignore`. Keys are forward-slash-normalized
/// paths relative to `root`.
pub fn hash_local_tree(
    root: &Path,
    allow_ext: &[String],
    ignore: &[String],
) -> std::io::Result<HashMap<String, String>> {
    let mut hashes = HashMap::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let relative_str = normalize_remote_path(&relative.to_string_lossy());
        if ignore.iter().any(|i| i == &relative_str) {
            continue;
        }
        if !allow_ext.is_empty() {
            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| allow_ext.iter().any(|a| a == ext))
                .unwrap_or(false);
            if !matches {
                continue;
            }
        }
        let bytes = std::fs::read(entry.path())?;
        let digest = Sha256::digest(&bytes);
        hashes.insert(relative_str, hex::encode(digest));
    }
    Ok(hashes)
}

/// Input to `Session::upload_project`.
pub struct UploadProjectRequest {
    pub project_root: PathBuf,
    pub allow_ext: Vec<String>,
    pub ignore: Vec<String>,
    pub follow: Option<UnboundedSender<String>>,
}

impl Session {
    /// Hashes `req.project_root` locally, asks the helper to hash the same
    /// relative paths, diffs the two maps, and uploads exactly the files
    /// that are new or changed. Resolves `None` if
    /// nothing needs uploading.
    pub async fn upload_project(&self, req: UploadProjectRequest) -> OperationOutcome {
        let local_hashes = match hash_local_tree(&req.project_root, &req.allow_ext, &req.ignore) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("local hashing failed for {}: {e}", req.project_root.display());
                return OperationOutcome::None;
            }
        };

        let mut relative_paths: Vec<String> = local_hashes.keys().cloned().collect();
        relative_paths.sort();

        let remote_hashes = self.calc_hashes(relative_paths.clone()).await;

        let to_upload = diff_for_upload(&local_hashes, &remote_hashes, &relative_paths);
        if to_upload.is_empty() {
            return OperationOutcome::None;
        }

        self.upload_files(
            to_upload,
            ":".to_string(),
            Some(req.project_root.to_string_lossy().into_owned()),
            false,
            req.follow,
        )
        .await
    }

    /// Mirror of `downloadProject`: lists the device root recursively, then
    /// downloads either to `dest` (multiple files) or `dest + the single
    /// path` (the helper treats a lone target as a literal file path).
    pub async fn download_project(
        &self,
        dest: String,
        follow: Option<UnboundedSender<String>>,
    ) -> OperationOutcome {
        let listing = self.list_contents_recursive("/".to_string()).await;
        let paths = match listing {
            OperationOutcome::ListContents { files } => {
                files.into_iter().map(|f| f.path).collect::<Vec<_>>()
            }
            _ => return OperationOutcome::None,
        };

        match paths.len() {
            0 => OperationOutcome::None,
            1 => {
                let target = format!("{dest}{}", paths[0]);
                self.download_files(paths, target, false, follow).await
            }
            _ => self.download_files(paths, dest, false, follow).await,
        }
    }
}

/// Every local path whose remote hash is absent or differs.
fn diff_for_upload(
    local_hashes: &HashMap<String, String>,
    remote_hashes: &HashMap<String, String>,
    relative_paths: &[String],
) -> Vec<String> {
    relative_paths
        .iter()
        .filter(|path| {
            let local = local_hashes.get(*path);
            let remote = remote_hashes.get(*path);
            remote != local
        })
        .cloned()
        .collect()
}
