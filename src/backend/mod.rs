//! Storage backend abstraction
//!
//! One minimal contract over both storage variants so the transfer engine
//! never branches on where a tree lives. `remove` is deliberately
//! non-recursive (one node, refuses non-empty directories); recursive
//! semantics belong to the engine's walks, which keeps the contract
//! identical across backends with different native recursive-delete
//! support.

pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::FsError;
use crate::types::{Entry, ListOptions};

pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// Which storage variant a backend is. Drives engine strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

/// Boxed byte stream for reading one leaf file
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed byte sink for writing one leaf file
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One storage system: local disk or a remote SFTP session.
///
/// Path methods are pure and delegate to [`crate::path`]; the engine goes
/// through them so it stays ignorant of the addressing scheme.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn join(&self, base: &str, name: &str) -> String;
    fn parent(&self, path: &str) -> Option<String>;
    fn basename(&self, path: &str) -> String;
    /// Whether `a` strictly contains `b` in this backend's addressing scheme.
    fn is_ancestor(&self, a: &str, b: &str) -> bool;

    /// Non-recursive directory contents, directories first then
    /// case-insensitive by name.
    async fn list(&self, path: &str, opts: &ListOptions) -> Result<Vec<Entry>, FsError>;

    /// Single-node metadata lookup.
    async fn stat(&self, path: &str) -> Result<Entry, FsError>;

    /// Create one directory. Fails with `AlreadyExists`; does not create
    /// missing parents (callers create top-down).
    async fn mkdir(&self, path: &str) -> Result<(), FsError>;

    /// Create an empty leaf file. Fails with `AlreadyExists`.
    async fn create_file(&self, path: &str) -> Result<(), FsError>;

    /// Remove exactly one node. Fails if the node is a non-empty directory.
    async fn remove(&self, path: &str) -> Result<(), FsError>;

    /// Rename one node within this backend. Fails with `AlreadyExists` if
    /// the target name is taken.
    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;

    /// Open a leaf file for streaming reads. Directories are never passed
    /// here.
    async fn open_read(&self, path: &str) -> Result<ByteReader, FsError>;

    /// Open (create or truncate) a leaf file for streaming writes.
    async fn open_write(&self, path: &str) -> Result<ByteWriter, FsError>;

    async fn exists(&self, path: &str) -> Result<bool, FsError> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn is_directory(&self, path: &str) -> Result<bool, FsError> {
        Ok(self.stat(path).await?.is_dir)
    }
}

/// Sort a listing the way the panes render it: directories first, then
/// case-insensitive by name.
pub(crate) fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool) -> Entry {
        Entry {
            name: name.to_string(),
            path: format!("/{}", name),
            is_dir,
            size: 0,
            modified: 0,
        }
    }

    #[test]
    fn test_sort_entries_dirs_first_then_name() {
        let mut entries = vec![
            entry("zeta.txt", false),
            entry("Alpha", true),
            entry("beta.txt", false),
            entry("gamma", true),
        ];
        sort_entries(&mut entries);

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "gamma", "beta.txt", "zeta.txt"]);
    }
}
