//! User identity resolution.
//!
//! The backend keys history by an opaque user id. The id comes from, in
//! order: an explicit override, `DAYDREAM_USER_ID`, the remembered
//! `user_id` file, and finally the shared fallback identity.

use crate::paths::DaydreamPaths;
use daydream_core::{DaydreamError, Result};
use std::fmt;
use std::fs;

pub const ENV_USER_ID: &str = "DAYDREAM_USER_ID";

/// Identity used when nobody has logged in.
pub const FALLBACK_USER_ID: &str = "user-temp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Override,
    Environment,
    File,
    Fallback,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Override => "command line",
            Self::Environment => ENV_USER_ID,
            Self::File => "saved login",
            Self::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub source: IdentitySource,
}

impl Identity {
    pub fn is_fallback(&self) -> bool {
        self.source == IdentitySource::Fallback
    }
}

#[derive(Debug, Clone)]
pub struct IdentityService {
    paths: DaydreamPaths,
}

impl IdentityService {
    pub fn new(paths: DaydreamPaths) -> Self {
        Self { paths }
    }

    /// Resolves the active identity using the process environment.
    pub fn resolve(&self, override_id: Option<&str>) -> Identity {
        self.resolve_with(override_id, |key| std::env::var(key).ok())
    }

    /// Resolves the active identity with an injectable environment lookup.
    pub fn resolve_with<F>(&self, override_id: Option<&str>, lookup: F) -> Identity
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = override_id.and_then(normalize) {
            return Identity {
                user_id: id,
                source: IdentitySource::Override,
            };
        }

        if let Some(id) = lookup(ENV_USER_ID).as_deref().and_then(normalize) {
            return Identity {
                user_id: id,
                source: IdentitySource::Environment,
            };
        }

        match self.saved() {
            Ok(Some(id)) => {
                return Identity {
                    user_id: id,
                    source: IdentitySource::File,
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("[IdentityService] Ignoring unreadable user_id file: {}", e);
            }
        }

        Identity {
            user_id: FALLBACK_USER_ID.to_string(),
            source: IdentitySource::Fallback,
        }
    }

    /// Remembers `user_id` for future sessions.
    ///
    /// # Errors
    ///
    /// Returns `DaydreamError::Config` for a blank id and `Io` when the file
    /// cannot be written.
    pub fn login(&self, user_id: &str) -> Result<String> {
        let id = normalize(user_id)
            .ok_or_else(|| DaydreamError::config("User id must not be empty"))?;

        let path = self.paths.user_id_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, format!("{}\n", id))?;
        tracing::info!("[IdentityService] Saved identity to {}", path.display());
        Ok(id)
    }

    /// Forgets the remembered identity. Returns `false` if none was saved.
    pub fn logout(&self) -> Result<bool> {
        match fs::remove_file(self.paths.user_id_file()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn saved(&self) -> Result<Option<String>> {
        let path = self.paths.user_id_file();
        match fs::read_to_string(&path) {
            Ok(content) => Ok(normalize(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
