//! Operation kinds and results.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

/// The 22 operation kinds the helper protocol supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    ScanPorts,
    Command { interactive: bool },
    FriendlyCommand,
    RetrieveTabComp,
    RunFile,
    ListContents { recursive: bool },
    UploadFiles,
    DownloadFiles,
    DeleteFiles,
    CreateFolders,
    DeleteFolders,
    DeleteFolderRecursive,
    DeleteFileOrFolder,
    CalcHashes,
    GetItemStat,
    RenameItem,
    SyncRtc,
    GetRtcTime,
    CheckStatus,
    SoftReset { verbose: bool },
    HardReset { follow: bool },
    CtrlD,
    Exit,
}

impl OperationKind {
    /// These kinds stream character-by-character rather than waiting for a
    /// newline before the state machine is invoked.
    pub fn streams_without_newline(&self) -> bool {
        matches!(
            self,
            OperationKind::FriendlyCommand
                | OperationKind::Command { interactive: true }
                | OperationKind::RunFile
        )
    }

    /// The fs-mutation kinds share the `Status{ok}` + verbose-progress
    /// parsing contract.
    pub fn is_fs_mutation(&self) -> bool {
        matches!(
            self,
            OperationKind::UploadFiles
                | OperationKind::DownloadFiles
                | OperationKind::DeleteFiles
                | OperationKind::CreateFolders
                | OperationKind::DeleteFolders
                | OperationKind::DeleteFolderRecursive
                | OperationKind::DeleteFileOrFolder
                | OperationKind::SyncRtc
        )
    }

    /// `command` / `friendlyCommand` / `runFile` / `retrieveTabComp` / `ctrlD`
    /// share the sentinel/err/EOO-with-optional-callback parsing contract.
    pub fn is_command_like(&self) -> bool {
        matches!(
            self,
            OperationKind::Command { .. }
                | OperationKind::FriendlyCommand
                | OperationKind::RunFile
                | OperationKind::RetrieveTabComp
                | OperationKind::CtrlD
        )
    }
}

/// `{ path, isDir, size, lastModified?, created? }`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, is_dir: bool, size: u64) -> Self {
        Self {
            path: path.into(),
            is_dir,
            size,
            last_modified: None,
            created: None,
        }
    }
}

/// Every facade method resolves to one of these; `None` is the sentinel
/// result used for disconnect/write-failure/cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    None,
    CommandResult {
        ok: bool,
    },
    CommandWithResponse {
        response: String,
    },
    TabComp {
        is_simple: bool,
        completion: String,
    },
    ListContents {
        files: Vec<FileRecord>,
    },
    Status {
        ok: bool,
    },
    GetItemStat {
        stat: Option<FileRecord>,
    },
    RtcTime {
        time: Option<DateTime<Utc>>,
    },
    PortsScan {
        ports: Vec<String>,
    },
    /// `calcHashes`'s parsed `path -> hash` map. Never
    /// surfaced to an external caller directly; `project_sync.rs` consumes
    /// it to compute the calc-hashes-then-upload diff.
    HashMap {
        hashes: std::collections::HashMap<String, String>,
    },
}

impl OperationOutcome {
    pub fn is_none(&self) -> bool {
        matches!(self, OperationOutcome::None)
    }

    /// Treats any non-`None` outcome whose `ok`/`stat`/`time` fields signal
    /// success as `true`; used by callers that only care about success.
    pub fn succeeded(&self) -> bool {
        match self {
            OperationOutcome::None => false,
            OperationOutcome::CommandResult { ok } | OperationOutcome::Status { ok } => *ok,
            OperationOutcome::CommandWithResponse { .. }
            | OperationOutcome::TabComp { .. }
            | OperationOutcome::ListContents { .. }
            | OperationOutcome::PortsScan { .. }
            | OperationOutcome::HashMap { .. } => true,
            OperationOutcome::GetItemStat { stat } => stat.is_some(),
            OperationOutcome::RtcTime { time } => time.is_some(),
        }
    }
}

/// A single request-in-flight.
pub struct Operation {
    pub id: u64,
    pub kind: OperationKind,
    /// Pre-encoded `{"command":...,"args":{...}}\n` line.
    pub request_line: String,
    /// Device-side paths in request order, used to format upload/download
    /// progress messages (`'<files[currentFilePos-1]>' [<pos>/<total>]`).
    pub progress_files: Vec<String>,
    /// The requested path for `getItemStat`, echoed into its result record.
    pub item_path: Option<String>,
    pub verbose: bool,
    pub follow: Option<mpsc::UnboundedSender<String>>,
    pub result: oneshot::Sender<OperationOutcome>,
}
