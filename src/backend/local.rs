//! Local filesystem backend over `tokio::fs`

use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tracing::debug;

use super::{sort_entries, BackendKind, ByteReader, ByteWriter, StorageBackend};
use crate::error::FsError;
use crate::path;
use crate::types::{Entry, ListOptions};

/// Backend for the pane's local side. Stateless; every pane can hold its
/// own instance.
#[derive(Debug, Default, Clone)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    /// Starting directory for a freshly bound local pane.
    pub fn home_dir() -> String {
        dirs::home_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    fn entry_from_metadata(name: String, full_path: String, meta: &std::fs::Metadata) -> Entry {
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Entry {
            name,
            path: full_path,
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified,
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn join(&self, base: &str, name: &str) -> String {
        path::local::join(base, name)
    }

    fn parent(&self, path: &str) -> Option<String> {
        path::local::parent(path)
    }

    fn basename(&self, path: &str) -> String {
        path::local::basename(path)
    }

    fn is_ancestor(&self, a: &str, b: &str) -> bool {
        path::local::is_ancestor(a, b)
    }

    async fn list(&self, path: &str, opts: &ListOptions) -> Result<Vec<Entry>, FsError> {
        let info = self.stat(path).await?;
        if !info.is_dir {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let mut read_dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(e, path))?
        {
            let name = dir_entry.file_name().to_string_lossy().to_string();
            if !opts.show_hidden && name.starts_with('.') {
                continue;
            }

            let full_path = dir_entry.path().to_string_lossy().to_string();
            let meta = dir_entry
                .metadata()
                .await
                .map_err(|e| FsError::from_io(e, &full_path))?;

            entries.push(Self::entry_from_metadata(name, full_path, &meta));
        }

        sort_entries(&mut entries);
        debug!("Listed {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<Entry, FsError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Self::entry_from_metadata(
            self.basename(path),
            path.to_string(),
            &meta,
        ))
    }

    async fn mkdir(&self, path: &str) -> Result<(), FsError> {
        debug!("Creating directory: {}", path);
        tokio::fs::create_dir(path)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn create_file(&self, path: &str) -> Result<(), FsError> {
        debug!("Creating file: {}", path);
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), FsError> {
        let info = self.stat(path).await?;
        if info.is_dir {
            tokio::fs::remove_dir(path)
                .await
                .map_err(|e| FsError::from_io(e, path))
        } else {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| FsError::from_io(e, path))
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        if self.exists(to).await? {
            return Err(FsError::AlreadyExists(to.to_string()));
        }
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| FsError::from_io(e, from))
    }

    async fn open_read(&self, path: &str) -> Result<ByteReader, FsError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &str) -> Result<ByteWriter, FsError> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn p(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_list_sorted_and_hidden_filter() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"").unwrap();

        let backend = LocalBackend::new();
        let root = dir.path().to_string_lossy().to_string();

        let entries = backend.list(&root, &ListOptions::default()).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "a.txt", "b.txt"]);

        let all = backend
            .list(
                &root,
                &ListOptions {
                    show_hidden: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_list_on_leaf_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = p(&dir, "a.txt");
        std::fs::write(&file, b"x").unwrap();

        let backend = LocalBackend::new();
        match backend.list(&file, &ListOptions::default()).await {
            Err(FsError::NotADirectory(path)) => assert_eq!(path, file),
            other => panic!("Expected NotADirectory, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stat_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        assert!(matches!(
            backend.stat(&p(&dir, "absent")).await,
            Err(FsError::NotFound(_))
        ));
        assert!(!backend.exists(&p(&dir, "absent")).await.unwrap());
    }

    #[tokio::test]
    async fn test_mkdir_and_create_file_reject_existing() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();

        let sub = p(&dir, "sub");
        backend.mkdir(&sub).await.unwrap();
        assert!(matches!(
            backend.mkdir(&sub).await,
            Err(FsError::AlreadyExists(_))
        ));

        let file = p(&dir, "new.txt");
        backend.create_file(&file).await.unwrap();
        assert!(matches!(
            backend.create_file(&file).await,
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_refuses_non_empty_directory() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();

        let sub = p(&dir, "sub");
        backend.mkdir(&sub).await.unwrap();
        std::fs::write(dir.path().join("sub/child.txt"), b"x").unwrap();

        assert!(backend.remove(&sub).await.is_err());
        assert!(backend.exists(&sub).await.unwrap());

        std::fs::remove_file(dir.path().join("sub/child.txt")).unwrap();
        backend.remove(&sub).await.unwrap();
        assert!(!backend.exists(&sub).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_rejects_taken_target() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();

        let from = p(&dir, "from.txt");
        let to = p(&dir, "to.txt");
        std::fs::write(&from, b"x").unwrap();
        std::fs::write(&to, b"y").unwrap();

        assert!(matches!(
            backend.rename(&from, &to).await,
            Err(FsError::AlreadyExists(_))
        ));

        std::fs::remove_file(&to).unwrap();
        backend.rename(&from, &to).await.unwrap();
        assert!(!backend.exists(&from).await.unwrap());
        assert_eq!(std::fs::read(&to).unwrap(), b"x");
    }
}
