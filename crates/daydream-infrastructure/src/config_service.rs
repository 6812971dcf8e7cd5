//! Configuration service implementation.
//!
//! Resolves the [`ClientConfig`] from `config.toml` and `DAYDREAM_*`
//! environment variables. Command-line overrides are applied by the caller
//! on the returned value.

use crate::paths::DaydreamPaths;
use crate::storage::AtomicFile;
use daydream_core::{ClientConfig, DaydreamError, HistoryBackend, Result};
use std::sync::{Arc, RwLock};

pub const ENV_API_URL: &str = "DAYDREAM_API_URL";
pub const ENV_STREAMING: &str = "DAYDREAM_STREAMING";
pub const ENV_HISTORY: &str = "DAYDREAM_HISTORY";

/// Configuration service that loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    paths: DaydreamPaths,
    /// Cached configuration. Uses RwLock for thread-safe lazy loading.
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    pub fn new(paths: DaydreamPaths) -> Self {
        Self {
            paths,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.toml` exists but cannot be parsed, or if an
    /// environment override has an invalid value.
    pub fn get_config(&self) -> Result<ClientConfig> {
        if let Ok(read_lock) = self.config.read() {
            if let Some(cached) = read_lock.as_ref() {
                return Ok(cached.clone());
            }
        }

        let mut loaded = self.load_file()?;
        apply_overrides(&mut loaded, |key| std::env::var(key).ok())?;

        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = Some(loaded.clone());
        }

        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = None;
        }
    }

    /// Writes a configuration file with default values if none exists.
    ///
    /// Returns `true` when a new file was created.
    pub fn init_file(&self) -> Result<bool> {
        let file = AtomicFile::<ClientConfig>::toml(self.paths.config_file());
        let created = file.create(&ClientConfig::default())?;
        if created {
            tracing::info!("[ConfigService] Created {}", file.path().display());
        }
        Ok(created)
    }

    pub fn paths(&self) -> &DaydreamPaths {
        &self.paths
    }

    fn load_file(&self) -> Result<ClientConfig> {
        let file = AtomicFile::<ClientConfig>::toml(self.paths.config_file());
        match file.load()? {
            Some(config) => {
                tracing::debug!("[ConfigService] Loaded {}", file.path().display());
                Ok(config)
            }
            None => Ok(ClientConfig::default()),
        }
    }
}

/// Applies `DAYDREAM_*` overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.api_url = url.trim().to_string();
    }

    if let Some(value) = lookup(ENV_STREAMING) {
        config.streaming = parse_bool(&value).ok_or_else(|| {
            DaydreamError::config(format!("{} must be a boolean, got '{}'", ENV_STREAMING, value))
        })?;
    }

    if let Some(value) = lookup(ENV_HISTORY) {
        config.history_backend = value
            .parse::<HistoryBackend>()
            .map_err(DaydreamError::config)?;
    }

    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
