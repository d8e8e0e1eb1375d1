//! Remote SFTP backend
//!
//! Every call checks session liveness first and fails with `SessionClosed`
//! rather than attempting I/O on a dead handle.

use std::sync::Arc;

use async_trait::async_trait;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{sort_entries, BackendKind, ByteReader, ByteWriter, StorageBackend};
use crate::error::FsError;
use crate::path;
use crate::session::RemoteSession;
use crate::types::{Entry, ListOptions};

/// Backend for a pane bound to an SFTP server. Holds the session the
/// owning pane's [`SessionManager`](crate::session::SessionManager) opened
/// for it.
pub struct RemoteBackend {
    session: Arc<RemoteSession>,
}

impl RemoteBackend {
    pub fn new(session: Arc<RemoteSession>) -> Self {
        Self { session }
    }

    /// Starting directory for a freshly connected pane.
    pub fn start_dir(&self) -> String {
        self.session.cwd().to_string()
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn join(&self, base: &str, name: &str) -> String {
        path::remote::join(base, name)
    }

    fn parent(&self, path: &str) -> Option<String> {
        path::remote::parent(path)
    }

    fn basename(&self, path: &str) -> String {
        path::remote::basename(path)
    }

    fn is_ancestor(&self, a: &str, b: &str) -> bool {
        path::remote::is_ancestor(a, b)
    }

    async fn list(&self, path: &str, opts: &ListOptions) -> Result<Vec<Entry>, FsError> {
        self.session.ensure_alive()?;

        let info = self.stat(path).await?;
        if !info.is_dir {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let read_dir = self
            .session
            .sftp()
            .read_dir(path)
            .await
            .map_err(|e| FsError::from_sftp(e, path))?;

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let name = dir_entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            if !opts.show_hidden && name.starts_with('.') {
                continue;
            }

            let full_path = self.join(path, &name);
            let metadata = dir_entry.metadata();

            entries.push(Entry {
                name,
                path: full_path,
                is_dir: metadata.is_dir(),
                size: metadata.size.unwrap_or(0),
                modified: metadata.mtime.map(|t| t as i64).unwrap_or(0),
            });
        }

        sort_entries(&mut entries);
        debug!("Listed {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<Entry, FsError> {
        self.session.ensure_alive()?;

        let metadata = self
            .session
            .sftp()
            .metadata(path)
            .await
            .map_err(|e| FsError::from_sftp(e, path))?;

        Ok(Entry {
            name: self.basename(path),
            path: path.to_string(),
            is_dir: metadata.is_dir(),
            size: metadata.size.unwrap_or(0),
            modified: metadata.mtime.map(|t| t as i64).unwrap_or(0),
        })
    }

    async fn mkdir(&self, path: &str) -> Result<(), FsError> {
        self.session.ensure_alive()?;

        // SFTP servers report an existing directory as a generic failure;
        // check first so the taxonomy stays uniform across backends.
        if self.exists(path).await? {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        debug!("Creating remote directory: {}", path);
        self.session
            .sftp()
            .create_dir(path)
            .await
            .map_err(|e| FsError::from_sftp(e, path))
    }

    async fn create_file(&self, path: &str) -> Result<(), FsError> {
        self.session.ensure_alive()?;

        if self.exists(path).await? {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        debug!("Creating remote file: {}", path);
        let mut file = self
            .session
            .sftp()
            .open_with_flags(path, OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE)
            .await
            .map_err(|e| FsError::from_sftp(e, path))?;

        file.shutdown()
            .await
            .map_err(|e| FsError::ProtocolError(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), FsError> {
        self.session.ensure_alive()?;

        let info = self.stat(path).await?;
        if info.is_dir {
            self.session
                .sftp()
                .remove_dir(path)
                .await
                .map_err(|e| FsError::from_sftp(e, path))
        } else {
            self.session
                .sftp()
                .remove_file(path)
                .await
                .map_err(|e| FsError::from_sftp(e, path))
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        self.session.ensure_alive()?;

        if self.exists(to).await? {
            return Err(FsError::AlreadyExists(to.to_string()));
        }

        debug!("Renaming {} to {}", from, to);
        self.session
            .sftp()
            .rename(from, to)
            .await
            .map_err(|e| FsError::from_sftp(e, from))
    }

    async fn open_read(&self, path: &str) -> Result<ByteReader, FsError> {
        self.session.ensure_alive()?;

        let file = self
            .session
            .sftp()
            .open(path)
            .await
            .map_err(|e| FsError::from_sftp(e, path))?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &str) -> Result<ByteWriter, FsError> {
        self.session.ensure_alive()?;

        let file = self
            .session
            .sftp()
            .open_with_flags(path, OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE)
            .await
            .map_err(|e| FsError::from_sftp(e, path))?;
        Ok(Box::new(file))
    }
}
