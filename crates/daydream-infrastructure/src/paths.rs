//! Unified path management for Daydream client files.
//!
//! Every file the client writes lives under one root directory so tests can
//! point the whole layout at a temporary directory.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for daydream_core::DaydreamError {
    fn from(e: PathError) -> Self {
        daydream_core::DaydreamError::config(e.to_string())
    }
}

/// Path layout for the Daydream client.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/daydream/          # Root (platform config dir + "daydream")
/// ├── config.toml              # Client configuration
/// ├── user_id                  # Remembered identity (plain text)
/// └── history/                 # Local history backend
///     └── <uuid-v5>.json       # One file per user id
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaydreamPaths {
    root: PathBuf,
}

impl DaydreamPaths {
    /// Resolves the platform default root (`~/.config/daydream` on Linux).
    pub fn from_platform() -> Result<Self, PathError> {
        dirs::config_dir()
            .map(|dir| Self::with_root(dir.join("daydream")))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Uses `root` as the configuration directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn user_id_file(&self) -> PathBuf {
        self.root.join("user_id")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.root.join("history")
    }

    /// History file for `user_id`.
    ///
    /// User ids are arbitrary strings, so the file name is a UUID v5 of the id
    /// to keep it filesystem-safe and stable.
    pub fn history_file(&self, user_id: &str) -> PathBuf {
        history_file_in(&self.history_dir(), user_id)
    }
}

pub(crate) fn history_file_in(dir: &Path, user_id: &str) -> PathBuf {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, user_id.as_bytes());
    dir.join(format!("{}.json", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let paths = DaydreamPaths::with_root("/tmp/dd");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/dd/config.toml"));
        assert_eq!(paths.user_id_file(), PathBuf::from("/tmp/dd/user_id"));
        assert!(paths.history_file("alice").starts_with("/tmp/dd/history"));
    }

    #[test]
    fn test_history_file_is_stable_and_distinct() {
        let paths = DaydreamPaths::with_root("/tmp/dd");
        assert_eq!(paths.history_file("alice"), paths.history_file("alice"));
        assert_ne!(paths.history_file("alice"), paths.history_file("bob"));
        assert_ne!(
            paths.history_file("../etc/passwd"),
            PathBuf::from("/tmp/dd/history/../etc/passwd.json")
        );
    }
}
