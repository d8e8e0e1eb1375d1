//! Session lifecycle and pane bindings
//!
//! Each pane holds exactly one backend binding at a time: local (no
//! connection state) or remote (owning one live SFTP session). Sessions are
//! never shared between panes. The per-pane operation lock serializes
//! transfers through a session; the binding cannot change while an
//! operation holds that lock.

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use russh_sftp::client::SftpSession;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{LocalBackend, RemoteBackend, StorageBackend};
use crate::error::FsError;
use crate::types::PaneId;

/// SSH connection configuration for one pane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote host address
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Authentication method
    pub auth: AuthMethod,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    30
}

/// Authentication methods supported
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    /// Password authentication
    Password { password: String },

    /// SSH key authentication
    Key {
        /// Path to private key file
        key_path: String,
        /// Optional passphrase for encrypted keys
        passphrase: Option<String>,
    },
}

/// Connection state of a pane's remote binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneState {
    Disconnected,
    Connecting,
    Connected,
}

/// One live SFTP session over an SSH connection, owned by exactly one pane.
///
/// Liveness is checked before every SFTP call; a closed session surfaces as
/// `SessionClosed` instead of I/O on a dead handle.
pub struct RemoteSession {
    sftp: SftpSession,
    handle: client::Handle<AcceptingHandler>,
    alive: AtomicBool,
    cwd: String,
}

impl RemoteSession {
    pub(crate) fn ensure_alive(&self) -> Result<(), FsError> {
        if self.alive.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(FsError::SessionClosed)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn sftp(&self) -> &SftpSession {
        &self.sftp
    }

    /// Server-side starting directory, canonicalized at connect time.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Mark the session dead and tear down the SSH connection. Safe to call
    /// more than once; in-flight operations fail with `SessionClosed`.
    async fn close(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            if let Err(e) = self
                .handle
                .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
                .await
            {
                debug!("SSH disconnect while closing session: {}", e);
            }
        }
    }
}

/// Client handler for russh callbacks.
///
/// Host keys are accepted on first use; known-hosts persistence belongs to
/// the embedding application, which can front this with its own preflight.
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = FsError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

struct Pane {
    backend: Arc<dyn StorageBackend>,
    session: Option<Arc<RemoteSession>>,
    state: PaneState,
    /// Single-writer lock: at most one in-flight operation per pane, and
    /// the binding only changes under it.
    op_lock: Arc<Mutex<()>>,
}

impl Pane {
    fn new_local() -> Self {
        Self {
            backend: Arc::new(LocalBackend::new()),
            session: None,
            state: PaneState::Disconnected,
            op_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Owns every pane's backend binding and remote session lifecycle.
pub struct SessionManager {
    panes: RwLock<HashMap<PaneId, Pane>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            panes: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a pane to the local filesystem (the default binding).
    pub async fn bind_local(&self, pane: PaneId) {
        self.bind(pane, Arc::new(LocalBackend::new())).await;
    }

    /// Replace a pane's backend binding. Waits for any in-flight operation
    /// on the pane; does not close remote sessions (use
    /// [`disconnect`](Self::disconnect) for those).
    pub async fn bind(&self, pane: PaneId, backend: Arc<dyn StorageBackend>) {
        let lock = self.op_lock(pane);
        let _guard = lock.lock_owned().await;

        let mut panes = self.panes.write();
        if let Some(p) = panes.get_mut(&pane) {
            p.backend = backend;
            p.session = None;
            p.state = PaneState::Disconnected;
        }
    }

    /// Establish an SSH connection, open the SFTP subsystem, and bind the
    /// pane to a fresh [`RemoteBackend`]. On failure the pane stays
    /// disconnected and the error is returned to the caller.
    pub async fn connect(&self, pane: PaneId, config: SshConfig) -> Result<(), FsError> {
        let lock = self.op_lock(pane);
        let _guard = lock.lock_owned().await;

        // Replace rather than stack: close any previous session first
        let previous = self.panes.read().get(&pane).and_then(|p| p.session.clone());
        if let Some(prev) = previous {
            prev.close().await;
        }

        self.set_state(pane, PaneState::Connecting);

        match Self::open_session(config).await {
            Ok(session) => {
                let session = Arc::new(session);
                let backend: Arc<dyn StorageBackend> =
                    Arc::new(RemoteBackend::new(session.clone()));

                let mut panes = self.panes.write();
                if let Some(p) = panes.get_mut(&pane) {
                    p.backend = backend;
                    p.session = Some(session);
                    p.state = PaneState::Connected;
                }
                info!("Pane {} connected", pane);
                Ok(())
            }
            Err(e) => {
                warn!("Pane {} connection failed: {}", pane, e);
                self.set_state(pane, PaneState::Disconnected);
                Err(e)
            }
        }
    }

    /// Close the pane's session (if any) and rebind it to the local
    /// filesystem. Idempotent: safe to call in any state, never errors.
    pub async fn disconnect(&self, pane: PaneId) {
        let snapshot = {
            let panes = self.panes.read();
            panes
                .get(&pane)
                .map(|p| (p.op_lock.clone(), p.session.clone()))
        };
        let Some((lock, session)) = snapshot else {
            return;
        };

        // Close before taking the lock so an in-flight transfer fails fast
        // with SessionClosed instead of blocking the disconnect.
        if let Some(ref s) = session {
            s.close().await;
        }

        let _guard = lock.lock_owned().await;
        let mut panes = self.panes.write();
        if let Some(p) = panes.get_mut(&pane) {
            p.session = None;
            p.backend = Arc::new(LocalBackend::new());
            p.state = PaneState::Disconnected;
        }
        info!("Pane {} disconnected", pane);
    }

    /// Close every pane's session (app shutdown).
    pub async fn disconnect_all(&self) {
        let pane_ids: Vec<PaneId> = self.panes.read().keys().copied().collect();
        info!("Disconnecting {} panes on shutdown", pane_ids.len());
        for pane in pane_ids {
            self.disconnect(pane).await;
        }
    }

    /// The backend a pane is currently bound to.
    pub fn backend(&self, pane: PaneId) -> Result<Arc<dyn StorageBackend>, FsError> {
        self.panes
            .read()
            .get(&pane)
            .map(|p| p.backend.clone())
            .ok_or(FsError::NotConnected)
    }

    pub fn state(&self, pane: PaneId) -> PaneState {
        self.panes
            .read()
            .get(&pane)
            .map(|p| p.state)
            .unwrap_or(PaneState::Disconnected)
    }

    /// The pane's single-writer operation lock. Creates the pane with a
    /// local binding if it does not exist yet.
    pub(crate) fn op_lock(&self, pane: PaneId) -> Arc<Mutex<()>> {
        let mut panes = self.panes.write();
        panes
            .entry(pane)
            .or_insert_with(Pane::new_local)
            .op_lock
            .clone()
    }

    fn set_state(&self, pane: PaneId, state: PaneState) {
        let mut panes = self.panes.write();
        if let Some(p) = panes.get_mut(&pane) {
            p.state = state;
        }
    }

    /// SSH handshake, authentication, and SFTP subsystem setup.
    async fn open_session(config: SshConfig) -> Result<RemoteSession, FsError> {
        let addr = format!("{}:{}", config.host, config.port);
        info!("Connecting to SSH server at {}", addr);

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| FsError::ConnectionFailed(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| FsError::ConnectionFailed("No address found".to_string()))?;

        let ssh_config = client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let mut handle = tokio::time::timeout(
            Duration::from_secs(config.timeout_secs),
            client::connect(Arc::new(ssh_config), socket_addr, AcceptingHandler),
        )
        .await
        .map_err(|_| FsError::Timeout("Connection timed out".to_string()))?
        .map_err(|e| FsError::ConnectionFailed(e.to_string()))?;

        debug!("SSH handshake completed");

        let authenticated = match &config.auth {
            AuthMethod::Password { password } => handle
                .authenticate_password(&config.username, password)
                .await
                .map_err(|e| FsError::AuthenticationFailed(e.to_string()))?,
            AuthMethod::Key {
                key_path,
                passphrase,
            } => {
                let key = russh::keys::load_secret_key(key_path, passphrase.as_deref())
                    .map_err(|e| FsError::KeyError(e.to_string()))?;
                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);

                handle
                    .authenticate_publickey(&config.username, key_with_hash)
                    .await
                    .map_err(|e| FsError::AuthenticationFailed(e.to_string()))?
            }
        };

        if !authenticated.success() {
            return Err(FsError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }

        info!("SSH authentication successful");

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| FsError::ConnectionFailed(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            FsError::SubsystemNotAvailable(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| FsError::SubsystemNotAvailable(e.to_string()))?;

        // Starting directory, same as the interactive shell would land in
        let cwd = sftp
            .canonicalize(".")
            .await
            .map_err(|e| FsError::ProtocolError(e.to_string()))?;

        info!("SFTP subsystem opened, cwd {}", cwd);

        Ok(RemoteSession {
            sftp,
            handle,
            alive: AtomicBool::new(true),
            cwd,
        })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    #[tokio::test]
    async fn test_unknown_pane_is_not_connected() {
        let manager = SessionManager::new();
        assert!(matches!(
            manager.backend(PaneId(9)),
            Err(FsError::NotConnected)
        ));
        assert_eq!(manager.state(PaneId(9)), PaneState::Disconnected);
    }

    #[tokio::test]
    async fn test_bind_local_exposes_local_backend() {
        let manager = SessionManager::new();
        manager.bind_local(PaneId(0)).await;

        let backend = manager.backend(PaneId(0)).unwrap();
        assert_eq!(backend.kind(), BackendKind::Local);
        assert_eq!(manager.state(PaneId(0)), PaneState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let manager = SessionManager::new();
        manager.bind_local(PaneId(1)).await;

        // Twice in a row, plus an unknown pane: never errors, never panics
        manager.disconnect(PaneId(1)).await;
        manager.disconnect(PaneId(1)).await;
        manager.disconnect(PaneId(42)).await;

        assert_eq!(manager.state(PaneId(1)), PaneState::Disconnected);
        assert!(manager.backend(PaneId(1)).is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_all_covers_every_pane() {
        let manager = SessionManager::new();
        manager.bind_local(PaneId(0)).await;
        manager.bind_local(PaneId(1)).await;
        manager.disconnect_all().await;
        assert_eq!(manager.state(PaneId(0)), PaneState::Disconnected);
        assert_eq!(manager.state(PaneId(1)), PaneState::Disconnected);
    }
}
