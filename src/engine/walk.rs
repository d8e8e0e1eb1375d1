//! Recursive tree walks
//!
//! Copy, move, and delete are realized here as walks over the
//! [`StorageBackend`] contract, so the same code runs regardless of which
//! variant is source and which is destination. Failures are collected per
//! node and the walk continues with remaining siblings; only
//! connection-level failures (and cancellation) abort the remainder.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::engine::control::OperationControl;
use crate::error::FsError;
use crate::types::{Entry, ListOptions, OperationResult, TransferProgress};

/// Buffer size for streaming leaf transfers (64 KB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Shared state of one walk: the two backends, the cancellation signal,
/// the progress sink, and the result being accumulated.
pub(crate) struct WalkCtx<'a> {
    pub src: &'a dyn StorageBackend,
    pub dst: &'a dyn StorageBackend,
    pub control: &'a OperationControl,
    pub progress: Option<&'a mpsc::Sender<TransferProgress>>,
    pub op_id: &'a str,
    pub result: OperationResult,
}

impl WalkCtx<'_> {
    fn record_failure(&mut self, entry: Entry, err: FsError) {
        warn!("{}: {}", entry.path, err);
        if err.aborts_batch() {
            self.result.aborted = true;
        }
        self.result.failed.push((entry, err));
    }

    async fn emit_progress(&self, entry_path: &str, bytes_done: u64, bytes_total: u64) {
        if let Some(tx) = self.progress {
            let _ = tx
                .send(TransferProgress {
                    operation_id: self.op_id.to_string(),
                    entry_path: entry_path.to_string(),
                    bytes_done,
                    bytes_total,
                })
                .await;
        }
    }
}

/// Copy one node (leaf or subtree) into `dst_dir`. With `delete_source`,
/// every source node is removed once its destination counterpart is
/// confirmed copied - bottom-up for directories, so no data is lost on a
/// partial move.
pub(crate) async fn copy_node(
    ctx: &mut WalkCtx<'_>,
    src_path: &str,
    dst_dir: &str,
    delete_source: bool,
) {
    if ctx.control.is_cancelled() {
        ctx.result.aborted = true;
        let name = ctx.src.basename(src_path);
        ctx.result
            .failed
            .push((Entry::unresolved(&name, src_path), FsError::Cancelled));
        return;
    }
    if ctx.result.aborted {
        return;
    }

    let entry = match ctx.src.stat(src_path).await {
        Ok(e) => e,
        Err(e) => {
            let name = ctx.src.basename(src_path);
            ctx.record_failure(Entry::unresolved(&name, src_path), e);
            return;
        }
    };

    let dst_path = ctx.dst.join(dst_dir, &entry.name);
    let dst_exists = match ctx.dst.exists(&dst_path).await {
        Ok(b) => b,
        Err(e) => {
            ctx.record_failure(entry, e);
            return;
        }
    };

    if entry.is_dir {
        if dst_exists {
            // Merge into an existing directory; a leaf of the same name
            // cannot be merged and skips the whole subtree.
            match ctx.dst.is_directory(&dst_path).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Skipping {}: {} exists and is not a directory", src_path, dst_path);
                    ctx.result.skipped.push(entry);
                    return;
                }
                Err(e) => {
                    ctx.record_failure(entry, e);
                    return;
                }
            }
        } else if let Err(e) = ctx.dst.mkdir(&dst_path).await {
            ctx.record_failure(entry, e);
            return;
        }

        let children = match ctx
            .src
            .list(src_path, &ListOptions { show_hidden: true })
            .await
        {
            Ok(c) => c,
            Err(e) => {
                ctx.record_failure(entry, e);
                return;
            }
        };

        let failures_before = ctx.result.failed.len();
        let skips_before = ctx.result.skipped.len();

        for child in &children {
            if ctx.result.aborted {
                break;
            }
            Box::pin(copy_node(ctx, &child.path, &dst_path, delete_source)).await;
        }

        let subtree_clean = !ctx.result.aborted
            && ctx.result.failed.len() == failures_before
            && ctx.result.skipped.len() == skips_before;

        if delete_source {
            // Source directory goes only after every descendant was copied
            // and removed; otherwise everything not yet moved stays put.
            if subtree_clean {
                match ctx.src.remove(src_path).await {
                    Ok(()) => ctx.result.succeeded.push(entry),
                    Err(e) => ctx.record_failure(entry, e),
                }
            }
        } else {
            ctx.result.succeeded.push(entry);
        }
    } else {
        if dst_exists {
            info!("Skipping {}: destination {} already exists", src_path, dst_path);
            ctx.result.skipped.push(entry);
            return;
        }

        match copy_leaf(ctx, &entry, &dst_path).await {
            Ok(()) => {
                if delete_source {
                    match ctx.src.remove(src_path).await {
                        Ok(()) => ctx.result.succeeded.push(entry),
                        Err(e) => ctx.record_failure(entry, e),
                    }
                } else {
                    ctx.result.succeeded.push(entry);
                }
            }
            Err(e) => ctx.record_failure(entry, e),
        }
    }
}

/// Stream one leaf file between backends in chunks.
///
/// On any failure or cancellation the partially written destination is
/// removed: no half-written destination leaf survives.
async fn copy_leaf(ctx: &mut WalkCtx<'_>, entry: &Entry, dst_path: &str) -> Result<(), FsError> {
    debug!("Copying {} -> {}", entry.path, dst_path);

    let mut reader = ctx.src.open_read(&entry.path).await?;
    let mut writer = ctx.dst.open_write(dst_path).await?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut transferred = 0u64;

    let mut outcome: Result<(), FsError> = loop {
        if ctx.control.is_cancelled() {
            break Err(FsError::Cancelled);
        }

        let bytes_read = match reader.read(&mut buffer).await {
            Ok(n) => n,
            Err(e) => break Err(FsError::IoError(e)),
        };
        if bytes_read == 0 {
            break Ok(());
        }

        if let Err(e) = writer.write_all(&buffer[..bytes_read]).await {
            break Err(FsError::IoError(e));
        }

        transferred += bytes_read as u64;
        ctx.emit_progress(&entry.path, transferred, entry.size).await;
    };

    if outcome.is_ok() {
        outcome = writer.flush().await.map_err(FsError::IoError);
    }
    if outcome.is_ok() {
        outcome = writer.shutdown().await.map_err(FsError::IoError);
    }

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(writer);
            if let Err(cleanup) = ctx.dst.remove(dst_path).await {
                warn!(
                    "Failed to clean up partial destination {}: {}",
                    dst_path, cleanup
                );
            }
            Err(e)
        }
    }
}

/// Delete one node post-order: children before the parent, since `remove`
/// refuses non-empty directories. Returns whether this node is gone.
pub(crate) async fn delete_node(ctx: &mut WalkCtx<'_>, path: &str) -> bool {
    if ctx.control.is_cancelled() {
        ctx.result.aborted = true;
        let name = ctx.src.basename(path);
        ctx.result
            .failed
            .push((Entry::unresolved(&name, path), FsError::Cancelled));
        return false;
    }
    if ctx.result.aborted {
        return false;
    }

    let entry = match ctx.src.stat(path).await {
        Ok(e) => e,
        Err(e) => {
            let name = ctx.src.basename(path);
            ctx.record_failure(Entry::unresolved(&name, path), e);
            return false;
        }
    };

    if entry.is_dir {
        let children = match ctx.src.list(path, &ListOptions { show_hidden: true }).await {
            Ok(c) => c,
            Err(e) => {
                ctx.record_failure(entry, e);
                return false;
            }
        };

        let mut all_children_gone = true;
        for child in &children {
            if ctx.result.aborted {
                all_children_gone = false;
                break;
            }
            if !Box::pin(delete_node(ctx, &child.path)).await {
                all_children_gone = false;
            }
        }

        if !all_children_gone {
            // The surviving children are already reported; removing the
            // parent would only add a NonEmpty failure on top.
            return false;
        }

        match ctx.src.remove(path).await {
            Ok(()) => {
                ctx.result.succeeded.push(entry);
                true
            }
            Err(e) => {
                ctx.record_failure(entry, e);
                false
            }
        }
    } else {
        match ctx.src.remove(path).await {
            Ok(()) => {
                ctx.result.succeeded.push(entry);
                true
            }
            Err(e) => {
                ctx.record_failure(entry, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::backend::LocalBackend;

    fn ctx<'a>(
        backend: &'a LocalBackend,
        control: &'a OperationControl,
    ) -> WalkCtx<'a> {
        WalkCtx {
            src: backend,
            dst: backend,
            control,
            progress: None,
            op_id: "op",
            result: OperationResult::default(),
        }
    }

    #[tokio::test]
    async fn test_copy_node_reports_entry_hit_by_cancellation() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"alpha").unwrap();
        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();

        let backend = LocalBackend::new();
        let control = OperationControl::new();
        control.cancel();
        let mut ctx = ctx(&backend, &control);

        copy_node(
            &mut ctx,
            &file.to_string_lossy(),
            &dest.to_string_lossy(),
            false,
        )
        .await;

        // The node lands in exactly one list even when cancellation fires
        // before any I/O on it
        assert!(ctx.result.aborted);
        assert_eq!(ctx.result.failed.len(), 1);
        assert_eq!(ctx.result.failed[0].0.name, "a.txt");
        assert!(matches!(ctx.result.failed[0].1, FsError::Cancelled));
        assert!(!dest.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_node_reports_entry_hit_by_cancellation() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"alpha").unwrap();

        let backend = LocalBackend::new();
        let control = OperationControl::new();
        control.cancel();
        let mut ctx = ctx(&backend, &control);

        assert!(!delete_node(&mut ctx, &file.to_string_lossy()).await);

        assert!(ctx.result.aborted);
        assert_eq!(ctx.result.failed.len(), 1);
        assert!(matches!(ctx.result.failed[0].1, FsError::Cancelled));
        assert!(file.exists());
    }
}
