//! Debounced persistence of the canonical log.
//!
//! [`HistorySync`] owns one background worker per user. Callers publish
//! snapshots of the whole log; the worker waits for the debounce window to
//! pass, takes the most recent snapshot and saves it. Saves run one at a
//! time on that single worker, so requests for a user never overlap and
//! intermediate snapshots are simply skipped.

use daydream_core::{HistoryStore, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    generation: u64,
    messages: Arc<Vec<Message>>,
}

/// Result of the most recent save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatus {
    /// Generation of the last snapshot the worker processed.
    pub generation: u64,
    /// Whether that save succeeded.
    pub ok: bool,
}

pub struct HistorySync {
    user_id: String,
    snapshots: watch::Sender<Snapshot>,
    status: watch::Receiver<SyncStatus>,
    flush_now: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HistorySync {
    /// Starts the worker for `user_id`. Must be called within a tokio runtime.
    pub fn spawn(store: Arc<dyn HistoryStore>, user_id: impl Into<String>, debounce: Duration) -> Self {
        let user_id = user_id.into();
        let (snapshots, snapshot_rx) = watch::channel(Snapshot::default());
        let (status_tx, status) = watch::channel(SyncStatus {
            generation: 0,
            ok: true,
        });
        let flush_now = Arc::new(Notify::new());

        let worker = tokio::spawn(run_worker(
            store,
            user_id.clone(),
            debounce,
            snapshot_rx,
            status_tx,
            flush_now.clone(),
        ));

        Self {
            user_id,
            snapshots,
            status,
            flush_now,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Schedules `messages` to be saved. Empty logs are not published.
    ///
    /// Returns the snapshot generation, or `None` when nothing was scheduled.
    pub fn publish(&self, messages: &[Message]) -> Option<u64> {
        if messages.is_empty() {
            return None;
        }
        Some(self.schedule(messages.to_vec()))
    }

    /// Persists an empty history and waits for the save to finish.
    pub async fn clear(&self) -> SyncStatus {
        self.schedule(Vec::new());
        self.flush().await
    }

    /// Waits until the most recently published snapshot has been processed.
    pub async fn flush(&self) -> SyncStatus {
        let target = self.snapshots.borrow().generation;
        let mut status = self.status.clone();

        if status.borrow().generation >= target {
            return *status.borrow();
        }

        self.flush_now.notify_one();
        match status.wait_for(|s| s.generation >= target).await {
            Ok(current) => *current,
            Err(_) => {
                tracing::warn!("[HistorySync] Worker for {} is gone", self.user_id);
                SyncStatus {
                    generation: target,
                    ok: false,
                }
            }
        }
    }

    /// Last save attempt seen by the worker.
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Flushes pending work, then stops the worker.
    pub async fn shutdown(&self) -> SyncStatus {
        let status = self.flush().await;
        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
            let _ = worker.await;
        }
        status
    }

    fn schedule(&self, messages: Vec<Message>) -> u64 {
        let messages = Arc::new(messages);
        let mut generation = 0;
        self.snapshots.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.messages = messages;
            generation = snapshot.generation;
        });
        generation
    }
}

async fn run_worker(
    store: Arc<dyn HistoryStore>,
    user_id: String,
    debounce: Duration,
    mut snapshots: watch::Receiver<Snapshot>,
    status: watch::Sender<SyncStatus>,
    flush_now: Arc<Notify>,
) {
    tracing::debug!(
        "[HistorySync] Worker started for {} ({} backend)",
        user_id,
        store.name()
    );

    while snapshots.changed().await.is_ok() {
        tokio::select! {
            _ = tokio::time::sleep(debounce) => {}
            _ = flush_now.notified() => {}
        }

        let snapshot = snapshots.borrow_and_update().clone();
        let ok = match store.save(&user_id, &snapshot.messages).await {
            Ok(()) => {
                tracing::debug!(
                    "[HistorySync] Saved generation {} ({} messages)",
                    snapshot.generation,
                    snapshot.messages.len()
                );
                true
            }
            Err(e) => {
                tracing::warn!("[HistorySync] Failed to save history for {}: {}", user_id, e);
                false
            }
        };

        status.send_replace(SyncStatus {
            generation: snapshot.generation,
            ok,
        });
    }

    tracing::debug!("[HistorySync] Worker for {} stopped", user_id);
}
