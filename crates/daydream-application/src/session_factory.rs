//! Wires configuration into ready-to-use sessions.

use crate::chat_session::{ChatSession, Responder};
use daydream_core::{ClientConfig, HistoryBackend, HistoryStore, NoOpHistoryStore, Renderer, Result};
use daydream_infrastructure::{DaydreamPaths, FileHistoryStore};
use daydream_interaction::http::{build_client, Client};
use daydream_interaction::{ChatApiClient, HttpHistoryStore, ImageApiClient, StreamClient};
use std::sync::Arc;

/// Builds sessions and collaborators from a resolved [`ClientConfig`].
///
/// All HTTP collaborators share one connection pool.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: ClientConfig,
    paths: DaydreamPaths,
    client: Client,
}

impl SessionFactory {
    pub fn new(config: ClientConfig, paths: DaydreamPaths) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self {
            config,
            paths,
            client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// History backend selected by `history_backend`.
    pub fn history_store(&self) -> Arc<dyn HistoryStore> {
        match self.config.history_backend {
            HistoryBackend::Remote => Arc::new(HttpHistoryStore::with_client(
                self.client.clone(),
                self.config.memory_url(),
                self.config.request_timeout(),
            )),
            HistoryBackend::File => Arc::new(FileHistoryStore::new(self.paths.history_dir())),
            HistoryBackend::None => Arc::new(NoOpHistoryStore),
        }
    }

    /// Streaming client unless streaming is disabled.
    pub fn responder(&self) -> Responder {
        if self.config.streaming {
            Responder::Streaming(StreamClient::with_client(
                self.client.clone(),
                self.config.stream_url(),
                self.config.stream_idle_timeout(),
            ))
        } else {
            Responder::Blocking(ChatApiClient::with_client(
                self.client.clone(),
                self.config.chat_url(),
                self.config.request_timeout(),
            ))
        }
    }

    pub fn images(&self) -> ImageApiClient {
        ImageApiClient::with_client(self.client.clone(), &self.config)
    }

    /// Creates a session for `user_id` and restores its history.
    pub async fn open_session<R: Renderer>(&self, user_id: &str, renderer: R) -> ChatSession<R> {
        let mut session = ChatSession::new(
            user_id,
            renderer,
            self.responder(),
            Some(self.images()),
            self.history_store(),
            self.config.sync_debounce(),
        );
        session.start().await;
        session
    }
}
