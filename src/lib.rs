//! forklift: dual-pane file transfer between local and SFTP storage.
//!
//! Each pane is bound to a storage backend (the local filesystem by
//! default, an SFTP session after connecting). The [`TransferEngine`]
//! moves data between panes through one [`StorageBackend`] abstraction,
//! so copy, move and delete share a single recursive walk regardless of
//! which side is remote.
//!
//! ```no_run
//! use std::sync::Arc;
//! use forklift::{ListOptions, OperationControl, OperationRequest, OperationKind, PaneId};
//! use forklift::{SessionManager, TransferEngine};
//!
//! # async fn demo() -> Result<(), forklift::FsError> {
//! let sessions = Arc::new(SessionManager::new());
//! sessions.bind_local(PaneId(0)).await;
//! sessions.bind_local(PaneId(1)).await;
//!
//! let engine = TransferEngine::new(sessions.clone());
//! let entries = sessions.backend(PaneId(0))?.list("/tmp", &ListOptions::default()).await?;
//! let mut request = OperationRequest::new(OperationKind::Copy, PaneId(0));
//! request.dest_pane = Some(PaneId(1));
//! request.entries = entries;
//! request.dest_dir = "/home/user/incoming".to_string();
//! let control = OperationControl::new();
//! let result = engine.execute(request, &control, None).await;
//! println!("{} copied, {} skipped", result.succeeded.len(), result.skipped.len());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod engine;
pub mod error;
pub mod path;
pub mod session;
pub mod types;

pub use backend::{BackendKind, LocalBackend, RemoteBackend, StorageBackend};
pub use engine::{select_strategy, OperationControl, Strategy, TransferEngine};
pub use error::FsError;
pub use session::{AuthMethod, PaneState, SessionManager, SshConfig};
pub use types::{
    Entry, ListOptions, OperationKind, OperationRequest, OperationResult, PaneId,
    TransferProgress,
};
