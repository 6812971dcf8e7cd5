//! Conversation history persistence.
//!
//! This module provides the storage abstraction the persistence bridge writes
//! through. The backend contract is "replace the whole history for this
//! user", so implementations receive the complete canonical log every time.

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;

/// Storage for per-user conversation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Loads the persisted history for `user_id`.
    ///
    /// An unknown identity or empty storage yields `Ok(vec![])`; only
    /// failures to reach or read the storage are errors.
    async fn load(&self, user_id: &str) -> Result<Vec<Message>>;

    /// Replaces the persisted history for `user_id` with `messages`.
    async fn save(&self, user_id: &str, messages: &[Message]) -> Result<()>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// A no-op implementation for when no persistence is configured.
pub struct NoOpHistoryStore;

#[async_trait]
impl HistoryStore for NoOpHistoryStore {
    async fn load(&self, _user_id: &str) -> Result<Vec<Message>> {
        // No-op: nothing was ever saved
        Ok(vec![])
    }

    async fn save(&self, _user_id: &str, _messages: &[Message]) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
