//! Per-backend path handling
//!
//! Pure functions, no I/O. Local paths use the platform-native separator;
//! remote SFTP paths always use `/` (per SFTP protocol, even for Windows
//! servers). Everything above this module addresses paths through the
//! [`StorageBackend`](crate::backend::StorageBackend) trait, which delegates
//! here, so the rest of the system never branches on the addressing scheme.

/// Path functions for the local filesystem (native separators).
pub mod local {
    use std::path::{Path, PathBuf};

    /// Join using the platform separator.
    ///
    /// Handles Windows and Unix bases alike:
    /// `C:\Users` + `file.txt` → `C:\Users\file.txt`,
    /// `/home/user` + `file.txt` → `/home/user/file.txt`.
    pub fn join(base: &str, name: &str) -> String {
        let mut path = PathBuf::from(base);
        path.push(name);
        path.to_string_lossy().to_string()
    }

    pub fn parent(path: &str) -> Option<String> {
        let parent = Path::new(path).parent()?;
        if parent.as_os_str().is_empty() {
            return None;
        }
        Some(parent.to_string_lossy().to_string())
    }

    pub fn basename(path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string())
    }

    /// Whether `a` strictly contains `b`. Component-wise, so `/foo/ba` is
    /// not an ancestor of `/foo/bar`.
    pub fn is_ancestor(a: &str, b: &str) -> bool {
        let a = Path::new(a);
        let b = Path::new(b);
        a != b && b.starts_with(a)
    }

    pub fn is_absolute(path: &str) -> bool {
        Path::new(path).is_absolute()
            // Unix-style absolute path, for cross-platform request payloads
            || path.starts_with('/')
    }
}

/// Path functions for remote SFTP paths (always `/`).
pub mod remote {
    pub fn join(base: &str, name: &str) -> String {
        if base.ends_with('/') {
            format!("{}{}", base, name)
        } else {
            format!("{}/{}", base, name)
        }
    }

    /// Strip a trailing separator, except from the root itself.
    fn normalize(path: &str) -> &str {
        if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        }
    }

    pub fn parent(path: &str) -> Option<String> {
        let path = normalize(path);
        if path == "/" {
            return None;
        }
        match path.rfind('/') {
            Some(0) => Some("/".to_string()),
            Some(idx) => Some(path[..idx].to_string()),
            None => None,
        }
    }

    pub fn basename(path: &str) -> String {
        let path = normalize(path);
        if path == "/" {
            return "/".to_string();
        }
        match path.rfind('/') {
            Some(idx) => path[idx + 1..].to_string(),
            None => path.to_string(),
        }
    }

    pub fn is_ancestor(a: &str, b: &str) -> bool {
        let a = normalize(a);
        let b = normalize(b);
        if a == b {
            return false;
        }
        if a == "/" {
            return b.starts_with('/');
        }
        b.starts_with(a) && b.as_bytes().get(a.len()) == Some(&b'/')
    }

    pub fn is_absolute(path: &str) -> bool {
        path.starts_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_join() {
        assert_eq!(remote::join("/home", "file.txt"), "/home/file.txt");
        assert_eq!(remote::join("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(remote::join("/", "home"), "/home");
    }

    #[test]
    fn test_remote_parent_basename() {
        assert_eq!(remote::parent("/home/user"), Some("/home".to_string()));
        assert_eq!(remote::parent("/home"), Some("/".to_string()));
        assert_eq!(remote::parent("/"), None);
        assert_eq!(remote::parent("/home/user/"), Some("/home".to_string()));

        assert_eq!(remote::basename("/home/user"), "user");
        assert_eq!(remote::basename("/home/user/"), "user");
        assert_eq!(remote::basename("/"), "/");
    }

    #[test]
    fn test_remote_is_ancestor() {
        assert!(remote::is_ancestor("/home", "/home/user"));
        assert!(remote::is_ancestor("/", "/home"));
        assert!(remote::is_ancestor("/home", "/home/user/deep"));
        // Same path is not an ancestor
        assert!(!remote::is_ancestor("/home", "/home"));
        assert!(!remote::is_ancestor("/home/", "/home"));
        // Sibling with a shared prefix
        assert!(!remote::is_ancestor("/home/ab", "/home/abc"));
        // Child never contains parent
        assert!(!remote::is_ancestor("/home/user", "/home"));
    }

    #[test]
    fn test_local_join_parent_basename() {
        let joined = local::join("/src", "a.txt");
        assert_eq!(local::basename(&joined), "a.txt");
        assert_eq!(local::parent(&joined), Some("/src".to_string()));
        assert_eq!(local::parent("/"), None);
    }

    #[test]
    fn test_local_is_ancestor() {
        assert!(local::is_ancestor("/a", "/a/b"));
        assert!(local::is_ancestor("/a", "/a/b/c"));
        assert!(!local::is_ancestor("/a", "/a"));
        assert!(!local::is_ancestor("/a/b", "/a"));
        // Component-wise, not byte-prefix
        assert!(!local::is_ancestor("/a/b", "/a/bc"));
    }

    #[test]
    fn test_is_absolute() {
        assert!(remote::is_absolute("/home/user"));
        assert!(!remote::is_absolute("relative/path"));
        assert!(local::is_absolute("/home/user"));
        assert!(!local::is_absolute("relative/path"));
    }
}
