//! Client configuration.
//!
//! Loaded from `~/.config/daydream/config.toml` by the infrastructure layer;
//! every field has a default so an empty or missing file is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://daydreamforge.onrender.com";
pub const DEFAULT_STREAM_PATH: &str = "/chat/stream";

/// Where conversation history is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// `GET/POST <api_url>/memory`
    #[default]
    Remote,
    /// Local JSON file per user.
    File,
    /// History is not persisted.
    None,
}

impl FromStr for HistoryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "file" => Ok(Self::File),
            "none" | "off" => Ok(Self::None),
            other => Err(format!(
                "Unknown history backend '{}' (expected remote, file or none)",
                other
            )),
        }
    }
}

impl fmt::Display for HistoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Remote => "remote",
            Self::File => "file",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin, e.g. `https://daydreamforge.onrender.com`.
    pub api_url: String,
    /// Path of the streaming chat endpoint, relative to `api_url`.
    pub stream_path: String,
    /// Maximum silence between two body reads before a stream is abandoned.
    pub stream_idle_timeout_ms: u64,
    /// Timeout for non-streaming requests (chat fallback, images, history).
    pub request_timeout_ms: u64,
    /// Connection establishment timeout for every request.
    pub connect_timeout_ms: u64,
    /// Delay used to coalesce history saves.
    pub sync_debounce_ms: u64,
    /// Use the streaming endpoint; `false` falls back to `/chat`.
    pub streaming: bool,
    pub history_backend: HistoryBackend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            stream_idle_timeout_ms: 300_000,
            request_timeout_ms: 60_000,
            connect_timeout_ms: 10_000,
            sync_debounce_ms: 500,
            streaming: true,
            history_backend: HistoryBackend::Remote,
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration pointing at `api_url`.
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Backend origin without trailing slash.
    pub fn origin(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn stream_url(&self) -> String {
        self.join(&self.stream_path)
    }

    pub fn chat_url(&self) -> String {
        self.join("/chat")
    }

    pub fn memory_url(&self) -> String {
        self.join("/memory")
    }

    pub fn generate_image_url(&self) -> String {
        self.join("/generate-image")
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_idle_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    fn join(&self, path: &str) -> String {
        format!("{}/{}", self.origin(), path.trim_start_matches('/'))
    }
}
