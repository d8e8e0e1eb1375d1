//! Transfer engine
//!
//! Consumes one [`OperationRequest`] at a time, resolves both panes'
//! backends through the [`SessionManager`], picks a strategy for the
//! backend pair, and runs the recursive walk. The engine holds no global
//! mutable state; independent requests may run concurrently, while
//! requests touching the same pane serialize on that pane's operation
//! lock.

pub mod control;
mod walk;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::backend::{BackendKind, StorageBackend};
use crate::error::FsError;
use crate::session::SessionManager;
use crate::types::{
    Entry, OperationKind, OperationRequest, OperationResult, PaneId, TransferProgress,
};

pub use control::OperationControl;
use walk::{copy_node, delete_node, WalkCtx};

/// The recursive algorithm chosen for a (source, destination) backend pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    LocalToLocal,
    Upload,
    Download,
    /// First-class rejection: no partial attempt is ever made.
    RemoteToRemote,
}

/// Strategy table keyed by the backend pair.
pub fn select_strategy(src: BackendKind, dst: BackendKind) -> Strategy {
    match (src, dst) {
        (BackendKind::Local, BackendKind::Local) => Strategy::LocalToLocal,
        (BackendKind::Local, BackendKind::Remote) => Strategy::Upload,
        (BackendKind::Remote, BackendKind::Local) => Strategy::Download,
        (BackendKind::Remote, BackendKind::Remote) => Strategy::RemoteToRemote,
    }
}

/// Orchestrates copy/move/delete/mkdir/create/rename across the two panes.
pub struct TransferEngine {
    sessions: Arc<SessionManager>,
}

impl TransferEngine {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run a request on a dedicated worker so the caller stays responsive.
    /// Returns the cancellation handle and a receiver for the terminal
    /// result.
    pub fn submit(
        &self,
        request: OperationRequest,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> (Arc<OperationControl>, oneshot::Receiver<OperationResult>) {
        let control = Arc::new(OperationControl::new());
        let (result_tx, result_rx) = oneshot::channel();

        let engine = TransferEngine {
            sessions: self.sessions.clone(),
        };
        let ctrl = control.clone();
        tokio::spawn(async move {
            let result = engine.execute(request, &ctrl, progress).await;
            let _ = result_tx.send(result);
        });

        (control, result_rx)
    }

    /// Execute one request to completion and report every node's outcome.
    pub async fn execute(
        &self,
        request: OperationRequest,
        control: &OperationControl,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> OperationResult {
        info!(
            "Executing {:?} ({} entries) as {}",
            request.kind,
            request.entries.len(),
            request.id
        );

        let mut result = OperationResult::default();

        let needs_dest = matches!(request.kind, OperationKind::Copy | OperationKind::Move);
        let dest_pane = if needs_dest {
            match request.dest_pane {
                Some(p) => Some(p),
                None => {
                    fail_all(&mut result, &request.entries, || {
                        FsError::InvalidRequest("missing destination pane".to_string())
                    });
                    return result;
                }
            }
        } else {
            None
        };

        // Reject panes that were never bound before creating their lock
        // entries below.
        if self.sessions.backend(request.source_pane).is_err()
            || dest_pane.is_some_and(|p| self.sessions.backend(p).is_err())
        {
            fail_all(&mut result, &request.entries, || FsError::NotConnected);
            result.aborted = true;
            info!("Request {} touches an unbound pane", request.id);
            return result;
        }

        // One in-flight operation per pane; locks taken in pane order so
        // two requests crossing the same pair cannot deadlock.
        let mut panes: Vec<PaneId> = vec![request.source_pane];
        if let Some(dest_pane) = dest_pane {
            if dest_pane != request.source_pane {
                panes.push(dest_pane);
            }
        }
        panes.sort();
        let mut guards = Vec::with_capacity(panes.len());
        for pane in &panes {
            guards.push(self.sessions.op_lock(*pane).lock_owned().await);
        }

        // Bindings are resolved under the locks, so they cannot change for
        // the rest of the operation.
        let src = match self.sessions.backend(request.source_pane) {
            Ok(b) => b,
            Err(_) => {
                fail_all(&mut result, &request.entries, || FsError::NotConnected);
                result.aborted = true;
                return result;
            }
        };
        let dst: Arc<dyn StorageBackend> = match dest_pane {
            Some(pane) => match self.sessions.backend(pane) {
                Ok(b) => b,
                Err(_) => {
                    fail_all(&mut result, &request.entries, || FsError::NotConnected);
                    result.aborted = true;
                    return result;
                }
            },
            None => src.clone(),
        };

        if needs_dest {
            let strategy = select_strategy(src.kind(), dst.kind());
            debug!("Strategy for {}: {:?}", request.id, strategy);

            if strategy == Strategy::RemoteToRemote {
                fail_all(&mut result, &request.entries, || {
                    FsError::Unsupported("remote-to-remote transfer".to_string())
                });
                return result;
            }
        }

        let mut ctx = WalkCtx {
            src: src.as_ref(),
            dst: dst.as_ref(),
            control,
            progress: progress.as_ref(),
            op_id: &request.id,
            result,
        };

        match request.kind {
            OperationKind::Copy => {
                run_transfer(&mut ctx, &request, false).await;
            }
            OperationKind::Move => {
                run_transfer(&mut ctx, &request, true).await;
            }
            OperationKind::Delete => {
                let mut remaining = request.entries.len();
                for (i, entry) in request.entries.iter().enumerate() {
                    if ctx.result.aborted || ctx.control.is_cancelled() {
                        ctx.result.aborted = true;
                        remaining = i;
                        break;
                    }
                    delete_node(&mut ctx, &entry.path).await;
                    remaining = i + 1;
                }
                mark_remaining(&mut ctx, &request.entries[remaining..]);
            }
            OperationKind::Mkdir => {
                create_named(&mut ctx, &request, true).await;
            }
            OperationKind::CreateFile => {
                create_named(&mut ctx, &request, false).await;
            }
            OperationKind::Rename => {
                rename_entries(&mut ctx, &request).await;
            }
        }

        let result = ctx.result;
        info!(
            "{} finished: {} succeeded, {} skipped, {} failed, aborted: {}",
            request.id,
            result.succeeded.len(),
            result.skipped.len(),
            result.failed.len(),
            result.aborted
        );
        result
    }
}

/// Copy or move every requested entry into the destination directory.
async fn run_transfer(ctx: &mut WalkCtx<'_>, request: &OperationRequest, delete_source: bool) {
    // Mandatory containment check before any I/O: rejecting a destination
    // inside (or equal to) its source prevents infinite recursion.
    let same_space = ctx.src.kind() == BackendKind::Local && ctx.dst.kind() == BackendKind::Local;
    let mut runnable = Vec::with_capacity(request.entries.len());
    for entry in &request.entries {
        if same_space {
            let dst_path = ctx.dst.join(&request.dest_dir, &entry.name);
            if dst_path == entry.path
                || request.dest_dir == entry.path
                || ctx.src.is_ancestor(&entry.path, &request.dest_dir)
            {
                ctx.result.failed.push((
                    entry.clone(),
                    FsError::SelfContainment {
                        src_path: entry.path.clone(),
                        dest: request.dest_dir.clone(),
                    },
                ));
                continue;
            }
        }
        runnable.push(entry);
    }

    let fast_path = delete_source && same_space;

    let mut remaining = runnable.len();
    for (i, entry) in runnable.iter().enumerate() {
        if ctx.result.aborted || ctx.control.is_cancelled() {
            ctx.result.aborted = true;
            remaining = i;
            break;
        }

        if fast_path && try_fast_move(ctx, entry, &request.dest_dir).await {
            remaining = i + 1;
            continue;
        }

        copy_node(ctx, &entry.path, &request.dest_dir, delete_source).await;
        remaining = i + 1;
    }

    let rest: Vec<Entry> = runnable[remaining..].iter().map(|e| (*e).clone()).collect();
    mark_remaining(ctx, &rest);
}

/// Local moves delegate to the OS rename when the destination slot is
/// free; anything else (conflicts, cross-device) falls back to the
/// generic walk. Returns true when the entry was fully handled here.
async fn try_fast_move(ctx: &mut WalkCtx<'_>, entry: &Entry, dest_dir: &str) -> bool {
    let dst_path = ctx.dst.join(dest_dir, &entry.name);
    match ctx.dst.exists(&dst_path).await {
        Ok(false) => match ctx.src.rename(&entry.path, &dst_path).await {
            Ok(()) => {
                debug!("Fast move {} -> {}", entry.path, dst_path);
                ctx.result.succeeded.push(entry.clone());
                true
            }
            // Cross-device or anything else: let the walk do it
            Err(_) => false,
        },
        _ => false,
    }
}

/// Mkdir / CreateFile: one new node named by the request in `dest_dir`.
async fn create_named(ctx: &mut WalkCtx<'_>, request: &OperationRequest, directory: bool) {
    let Some(name) = request.new_name.as_deref().filter(|n| !n.is_empty()) else {
        ctx.result.failed.push((
            Entry::unresolved("", &request.dest_dir),
            FsError::InvalidRequest("missing name".to_string()),
        ));
        return;
    };

    let path = ctx.src.join(&request.dest_dir, name);
    let entry = Entry {
        name: name.to_string(),
        path: path.clone(),
        is_dir: directory,
        size: 0,
        modified: 0,
    };

    let outcome = if directory {
        ctx.src.mkdir(&path).await
    } else {
        ctx.src.create_file(&path).await
    };

    match outcome {
        Ok(()) => ctx.result.succeeded.push(entry),
        Err(e) => ctx.result.failed.push((entry, e)),
    }
}

/// Rename each requested entry to the request's new name, within its own
/// parent directory on the source backend.
async fn rename_entries(ctx: &mut WalkCtx<'_>, request: &OperationRequest) {
    let Some(name) = request.new_name.as_deref().filter(|n| !n.is_empty()) else {
        fail_all(&mut ctx.result, &request.entries, || {
            FsError::InvalidRequest("missing name".to_string())
        });
        return;
    };

    for entry in &request.entries {
        let Some(parent) = ctx.src.parent(&entry.path) else {
            ctx.result.failed.push((
                entry.clone(),
                FsError::InvalidRequest("cannot rename root".to_string()),
            ));
            continue;
        };
        let to = ctx.src.join(&parent, name);
        match ctx.src.rename(&entry.path, &to).await {
            Ok(()) => ctx.result.succeeded.push(entry.clone()),
            Err(e) => ctx.result.failed.push((entry.clone(), e)),
        }
    }
}

fn fail_all(result: &mut OperationResult, entries: &[Entry], err: impl Fn() -> FsError) {
    for entry in entries {
        result.failed.push((entry.clone(), err()));
    }
}

/// Entries never attempted because the batch aborted: each is reported
/// once, with the reason the batch stopped.
fn mark_remaining(ctx: &mut WalkCtx<'_>, entries: &[Entry]) {
    if !ctx.result.aborted {
        return;
    }
    for entry in entries {
        let err = if ctx.control.is_cancelled() {
            FsError::Cancelled
        } else {
            FsError::SessionClosed
        };
        ctx.result.failed.push((entry.clone(), err));
    }
}
