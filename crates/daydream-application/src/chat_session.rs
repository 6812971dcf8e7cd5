//! Turn orchestration for one user's conversation.
//!
//! [`ChatSession`] is the only place where I/O results meet the reducer:
//! stream events are pulled from a per-turn channel and applied to the
//! [`Conversation`] on the caller's task, and the canonical log is handed to
//! [`HistorySync`] at quiescent points.

use crate::history_sync::{HistorySync, SyncStatus};
use daydream_core::image::{image_prompt, is_image_request, IMAGE_ACKNOWLEDGEMENT};
use daydream_core::{
    ChatRequest, Conversation, DaydreamError, HistoryStore, ImageRef, Renderer, Result, TurnEnd,
};
use daydream_interaction::{ChannelHandler, ChatApiClient, ImageApiClient, StreamClient, StreamEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// How the assistant reply is obtained.
#[derive(Debug, Clone)]
pub enum Responder {
    Streaming(StreamClient),
    Blocking(ChatApiClient),
}

/// Result of [`ChatSession::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply finished; `index` is its position in the log.
    Completed { index: usize },
    /// The turn failed; partial content, if any, was kept.
    Failed { error: DaydreamError },
    /// The turn was interrupted by the caller.
    Cancelled,
    /// An image was generated instead of a text reply.
    Image { image: ImageRef },
    /// Nothing to send.
    Skipped,
}

/// Cancels the turn currently running on a [`ChatSession`].
///
/// Cloneable and usable from another task (e.g. a Ctrl-C listener).
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupter {
    /// Cancels the running turn. Returns `false` if no turn was running.
    pub fn interrupt(&self) -> bool {
        let Ok(current) = self.current.lock() else {
            return false;
        };
        match current.as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
        }
        token
    }

    fn disarm(&self) {
        if let Ok(mut current) = self.current.lock() {
            current.take();
        }
    }
}

pub struct ChatSession<R: Renderer> {
    user_id: String,
    conversation: Conversation<R>,
    responder: Responder,
    images: Option<ImageApiClient>,
    store: Arc<dyn HistoryStore>,
    sync: HistorySync,
    /// Revision of the log last handed to `sync`.
    published: u64,
    attachment: Option<ImageRef>,
    interrupter: Interrupter,
}

impl<R: Renderer> ChatSession<R> {
    /// Creates a session for `user_id`. Must be called within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `renderer` - Presentation mapping for the render log
    /// * `responder` - Streaming or blocking chat client
    /// * `images` - Image generation client; `None` disables image requests
    /// * `store` - History backend
    /// * `debounce` - Delay used to coalesce history saves
    pub fn new(
        user_id: impl Into<String>,
        renderer: R,
        responder: Responder,
        images: Option<ImageApiClient>,
        store: Arc<dyn HistoryStore>,
        debounce: Duration,
    ) -> Self {
        let user_id = user_id.into();
        let sync = HistorySync::spawn(store.clone(), user_id.clone(), debounce);

        Self {
            user_id,
            conversation: Conversation::new(renderer),
            responder,
            images,
            store,
            sync,
            published: 0,
            attachment: None,
            interrupter: Interrupter::default(),
        }
    }

    /// Restores persisted history, replacing the current log.
    ///
    /// Load failures are logged and leave the conversation empty; chat stays
    /// usable. Restoring never schedules a save. Returns the number of
    /// restored messages.
    pub async fn start(&mut self) -> usize {
        let messages = match self.store.load(&self.user_id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(
                    "[ChatSession] Could not restore history for {}: {}",
                    self.user_id,
                    e
                );
                Vec::new()
            }
        };

        let count = messages.len();
        self.conversation.replace_all(messages);
        self.published = self.conversation.revision();
        tracing::info!("[ChatSession] Restored {} messages for {}", count, self.user_id);
        count
    }

    /// Sends one user turn and drives it to completion.
    ///
    /// `on_delta` sees every piece of reply text as it is applied to the log.
    /// Errors never escape: a failed turn leaves a visible error notice in
    /// the render log and is reported as [`TurnOutcome::Failed`].
    pub async fn send<F>(&mut self, text: &str, mut on_delta: F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let text = text.trim();
        if text.is_empty() && self.attachment.is_none() {
            return TurnOutcome::Skipped;
        }

        let attachment = self.attachment.take();
        let wants_image = self.images.is_some() && is_image_request(text);

        self.conversation.append_user(text, attachment.clone());
        self.publish();

        let cancel = self.interrupter.arm();
        let outcome = if wants_image {
            self.run_image_turn(text, attachment.as_ref(), &cancel).await
        } else {
            let request = ChatRequest::new(self.user_id.clone(), self.conversation.messages().to_vec())
                .with_image(attachment);
            self.conversation.begin_assistant_turn();
            self.run_chat_turn(&request, &cancel, &mut on_delta).await
        };
        self.interrupter.disarm();

        self.publish();
        outcome
    }

    /// Sets the image attached to the next message.
    pub fn attach(&mut self, image: Option<ImageRef>) {
        self.attachment = image;
    }

    pub fn attachment(&self) -> Option<&ImageRef> {
        self.attachment.as_ref()
    }

    /// Empties the conversation and the persisted history.
    pub async fn clear(&mut self) -> SyncStatus {
        self.conversation.clear();
        self.published = self.conversation.revision();
        self.sync.clear().await
    }

    /// Waits for pending history saves.
    pub async fn flush(&self) -> SyncStatus {
        self.sync.flush().await
    }

    /// Interrupts any running turn, flushes history and stops the sync worker.
    pub async fn shutdown(&self) -> SyncStatus {
        self.interrupter.interrupt();
        self.sync.shutdown().await
    }

    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    pub fn conversation(&self) -> &Conversation<R> {
        &self.conversation
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn history_backend(&self) -> &'static str {
        self.store.name()
    }

    async fn run_chat_turn(
        &mut self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_delta: &mut impl FnMut(&str),
    ) -> TurnOutcome {
        let result = match self.responder.clone() {
            Responder::Streaming(client) => {
                self.stream_reply(&client, request, cancel, on_delta).await
            }
            Responder::Blocking(client) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DaydreamError::Cancelled),
                    reply = client.send(request) => reply.map(|reply| {
                        self.conversation.apply_delta(&reply);
                        on_delta(&reply);
                    }),
                }
            }
        };

        match result {
            Ok(()) => match self.conversation.complete_turn() {
                TurnEnd::Kept { index } => TurnOutcome::Completed { index },
                other => {
                    tracing::warn!("[ChatSession] Completed turn ended as {:?}", other);
                    TurnOutcome::Completed {
                        index: self.conversation.len().saturating_sub(1),
                    }
                }
            },
            Err(DaydreamError::Cancelled) => {
                self.conversation.cancel_turn();
                tracing::info!("[ChatSession] Turn cancelled");
                TurnOutcome::Cancelled
            }
            Err(error) => {
                tracing::warn!("[ChatSession] Turn failed: {}", error);
                self.conversation.fail_turn(error.to_string());
                TurnOutcome::Failed { error }
            }
        }
    }

    /// Pulls stream events into the reducer until a terminal event arrives.
    async fn stream_reply(
        &mut self,
        client: &StreamClient,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_delta: &mut impl FnMut(&str),
    ) -> Result<()> {
        // A fresh channel per turn: events of an earlier stream cannot reach
        // this conversation.
        let (handler, mut events) = ChannelHandler::new();
        let handle = client.open(request, handler)?;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    handle.cancel();
                    return self.settle_queued(&mut events, on_delta);
                }
                event = events.recv() => event,
            };

            match event {
                Some(event) => {
                    if let Some(end) = self.apply_event(event, on_delta) {
                        return end;
                    }
                }
                // Sender dropped without a terminal event: the stream was cancelled
                None => return Err(DaydreamError::Cancelled),
            }
        }
    }

    /// Applies events the transport delivered before the interrupt.
    ///
    /// A terminal event already in the queue decides the outcome; otherwise
    /// the turn ends as cancelled with the partial content kept.
    fn settle_queued(
        &mut self,
        events: &mut UnboundedReceiver<StreamEvent>,
        on_delta: &mut impl FnMut(&str),
    ) -> Result<()> {
        while let Ok(event) = events.try_recv() {
            if let Some(end) = self.apply_event(event, on_delta) {
                return end;
            }
        }
        Err(DaydreamError::Cancelled)
    }

    /// Applies one stream event. Returns the turn result for terminal events.
    fn apply_event(
        &mut self,
        event: StreamEvent,
        on_delta: &mut impl FnMut(&str),
    ) -> Option<Result<()>> {
        match event {
            StreamEvent::Delta(text) => {
                self.conversation.apply_delta(&text);
                on_delta(&text);
                None
            }
            StreamEvent::Done => Some(Ok(())),
            StreamEvent::Error(error) => Some(Err(error)),
        }
    }

    async fn run_image_turn(
        &mut self,
        text: &str,
        identity: Option<&ImageRef>,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let Some(images) = self.images.clone() else {
            return TurnOutcome::Skipped;
        };
        let prompt = image_prompt(text);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DaydreamError::Cancelled),
            result = images.generate(&self.user_id, &prompt, identity) => result,
        };

        match result {
            Ok(image) => {
                self.conversation
                    .attach_image(IMAGE_ACKNOWLEDGEMENT, image.clone());
                TurnOutcome::Image { image }
            }
            Err(DaydreamError::Cancelled) => TurnOutcome::Cancelled,
            Err(error) => {
                tracing::warn!("[ChatSession] Image generation failed: {}", error);
                self.conversation
                    .fail_turn(format!("Image generation failed: {}", error));
                TurnOutcome::Failed { error }
            }
        }
    }

    fn publish(&mut self) {
        if self.conversation.is_streaming() {
            return;
        }
        let revision = self.conversation.revision();
        if revision == self.published {
            return;
        }
        self.sync.publish(self.conversation.messages());
        self.published = revision;
    }
}
