//! Error types shared by both storage backends and the transfer engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Pane not connected")]
    NotConnected,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Destination {dest} is inside source {src_path}")]
    SelfContainment { src_path: String, dest: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("SFTP subsystem not available: {0}")]
    SubsystemNotAvailable(String),

    #[error("SFTP protocol error: {0}")]
    ProtocolError(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FsError {
    /// Map a local I/O error into the backend taxonomy, attaching the path.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            ErrorKind::PermissionDenied => FsError::AccessDenied(path.to_string()),
            ErrorKind::AlreadyExists => FsError::AlreadyExists(path.to_string()),
            ErrorKind::NotADirectory => FsError::NotADirectory(path.to_string()),
            _ => FsError::IoError(err),
        }
    }

    /// Map an SFTP client error into the backend taxonomy, attaching the path.
    ///
    /// russh-sftp surfaces server status codes through its error display;
    /// match on the message the same way the status is reported.
    pub fn from_sftp(err: russh_sftp::client::error::Error, path: &str) -> Self {
        let err_str = err.to_string();
        if err_str.contains("No such file") || err_str.contains("not found") {
            FsError::NotFound(path.to_string())
        } else if err_str.contains("Permission denied") {
            FsError::AccessDenied(path.to_string())
        } else {
            FsError::ProtocolError(err_str)
        }
    }

    /// Whether this failure is connection-level: once seen, every remaining
    /// node that would go through the same session is marked failed without
    /// further attempts.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, FsError::SessionClosed | FsError::Cancelled)
    }
}

impl From<russh::Error> for FsError {
    fn from(err: russh::Error) -> Self {
        FsError::ProtocolError(err.to_string())
    }
}

// Results cross an IPC boundary in the embedding shell; serialize as the
// display string.
impl serde::Serialize for FsError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_common_kinds() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match FsError::from_io(err, "/tmp/x") {
            FsError::NotFound(p) => assert_eq!(p, "/tmp/x"),
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            FsError::from_io(err, "/tmp/x"),
            FsError::AccessDenied(_)
        ));

        let err = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "there");
        assert!(matches!(
            FsError::from_io(err, "/tmp/x"),
            FsError::AlreadyExists(_)
        ));
    }

    #[test]
    fn test_self_containment_display_names_both_paths() {
        let err = FsError::SelfContainment {
            src_path: "/a/b".to_string(),
            dest: "/a/b/c".to_string(),
        };
        assert_eq!(err.to_string(), "Destination /a/b/c is inside source /a/b");
    }

    #[test]
    fn test_aborts_batch() {
        assert!(FsError::SessionClosed.aborts_batch());
        assert!(FsError::Cancelled.aborts_batch());
        assert!(!FsError::NotFound("x".into()).aborts_batch());
        assert!(!FsError::AccessDenied("x".into()).aborts_batch());
    }
}
