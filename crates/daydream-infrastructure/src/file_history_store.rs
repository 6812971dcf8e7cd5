//! Local file-backed history store.
//!
//! Each user's history lives in its own JSON document under
//! `~/.config/daydream/history/`. Saves replace the whole document
//! atomically, matching the remote backend's replace-all contract.

use crate::paths::history_file_in;
use crate::storage::AtomicFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daydream_core::{DaydreamError, HistoryStore, Message, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::task;

/// On-disk document for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryDocument {
    user_id: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<Message>,
}

/// A [`HistoryStore`] that keeps one JSON file per user.
///
/// All file operations run in `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, user_id: &str) -> AtomicFile<HistoryDocument> {
        AtomicFile::json(history_file_in(&self.dir, user_id))
    }

    fn load_sync(file: AtomicFile<HistoryDocument>, user_id: &str) -> Result<Vec<Message>> {
        match file.load()? {
            Some(doc) if doc.user_id == user_id => Ok(doc.messages),
            Some(doc) => {
                tracing::warn!(
                    "[FileHistoryStore] {} belongs to '{}', not '{}'; ignoring",
                    file.path().display(),
                    doc.user_id,
                    user_id
                );
                Ok(vec![])
            }
            None => Ok(vec![]),
        }
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self, user_id: &str) -> Result<Vec<Message>> {
        let file = self.file_for(user_id);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || Self::load_sync(file, &user_id))
            .await
            .map_err(|e| DaydreamError::io(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn save(&self, user_id: &str, messages: &[Message]) -> Result<()> {
        let file = self.file_for(user_id);
        let document = HistoryDocument {
            user_id: user_id.to_string(),
            updated_at: Utc::now(),
            messages: messages.to_vec(),
        };

        task::spawn_blocking(move || file.save(&document).map_err(DaydreamError::from))
            .await
            .map_err(|e| DaydreamError::io(format!("Failed to spawn blocking task: {}", e)))??;

        tracing::debug!(
            "[FileHistoryStore] Saved {} messages for {}",
            messages.len(),
            user_id
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
