//! Value types exchanged between panes, the engine, and an embedding shell

use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// One navigation pane. A pane is bound to exactly one backend at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaneId(pub u32);

impl std::fmt::Display for PaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pane-{}", self.0)
    }
}

/// Metadata snapshot of one file or directory, taken at listing time.
///
/// Never mutated; a fresh listing supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// File name (not full path)
    pub name: String,
    /// Full path in the owning backend's addressing scheme
    pub path: String,
    /// Directory flag
    pub is_dir: bool,
    /// Size in bytes (0 for directories on backends that report none)
    pub size: u64,
    /// Last modified time (Unix timestamp)
    pub modified: i64,
}

impl Entry {
    /// Placeholder entry for a path whose metadata could not be read,
    /// so the failure can still be reported against something.
    pub(crate) fn unresolved(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            is_dir: false,
            size: 0,
            modified: 0,
        }
    }
}

/// Filter for directory listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    /// Show hidden files (starting with .)
    #[serde(default)]
    pub show_hidden: bool,
}

/// Operation requested by a UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Move,
    Delete,
    Mkdir,
    CreateFile,
    Rename,
}

/// The contract between UI collaborators and the engine.
///
/// Created by a collaborator, consumed exactly once, discarded after
/// producing an [`OperationResult`]. Never queued or retried automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Correlation id for progress events
    #[serde(default = "new_operation_id")]
    pub id: String,
    pub kind: OperationKind,
    /// Pane the selected entries live in
    pub source_pane: PaneId,
    /// Pane receiving the transfer (Copy/Move only)
    pub dest_pane: Option<PaneId>,
    /// Selected entries the operation applies to
    pub entries: Vec<Entry>,
    /// Destination directory (Copy/Move), or the directory a new node is
    /// created in (Mkdir/CreateFile)
    pub dest_dir: String,
    /// Name for Mkdir/CreateFile/Rename
    pub new_name: Option<String>,
}

fn new_operation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl OperationRequest {
    pub fn new(kind: OperationKind, source_pane: PaneId) -> Self {
        Self {
            id: new_operation_id(),
            kind,
            source_pane,
            dest_pane: None,
            entries: Vec::new(),
            dest_dir: String::new(),
            new_name: None,
        }
    }
}

/// Terminal result of one request.
///
/// Skipped entries (name conflict at the destination) are reported
/// separately so the skip policy stays visible to the caller.
#[derive(Debug, Default, Serialize)]
pub struct OperationResult {
    pub succeeded: Vec<Entry>,
    pub skipped: Vec<Entry>,
    pub failed: Vec<(Entry, FsError)>,
    /// True when the remainder of the batch was abandoned (session loss or
    /// cancellation), not just individual node failures.
    pub aborted: bool,
}

impl OperationResult {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }
}

/// Progress notification for one entry in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Operation id this event belongs to
    pub operation_id: String,
    /// Path of the entry currently transferring (source addressing scheme)
    pub entry_path: String,
    /// Bytes transferred for this entry so far
    pub bytes_done: u64,
    /// Total bytes for this entry
    pub bytes_total: u64,
}

impl TransferProgress {
    /// Progress percentage for this entry (0-100)
    pub fn percentage(&self) -> f64 {
        if self.bytes_total == 0 {
            100.0
        } else {
            (self.bytes_done as f64 / self.bytes_total as f64) * 100.0
        }
    }
}
