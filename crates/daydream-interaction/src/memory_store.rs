//! Remote history store backed by the `/memory` endpoints.

use crate::http::{build_client, error_from_response, map_reqwest_error};
use async_trait::async_trait;
use daydream_core::{ClientConfig, HistoryStore, Message, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SaveMemoryRequest<'a> {
    user_id: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct MemoryResponse {
    #[serde(default)]
    messages: Option<Vec<Message>>,
    #[serde(default)]
    error: Option<String>,
}

/// [`HistoryStore`] over `GET /memory?user_id=` and `POST /memory`.
#[derive(Debug, Clone)]
pub struct HttpHistoryStore {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpHistoryStore {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(
            build_client(config)?,
            config.memory_url(),
            config.request_timeout(),
        ))
    }

    pub fn with_client(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn load(&self, user_id: &str) -> Result<Vec<Message>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("user_id", user_id)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("[HttpHistoryStore] No history for {}", user_id);
            return Ok(vec![]);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: MemoryResponse = response.json().await.map_err(map_reqwest_error)?;
        if let Some(error) = body.error {
            // Unknown identity or empty storage
            tracing::debug!("[HttpHistoryStore] Treating '{}' as empty history", error);
            return Ok(vec![]);
        }

        let messages = body.messages.unwrap_or_default();
        tracing::info!(
            "[HttpHistoryStore] Loaded {} messages for {}",
            messages.len(),
            user_id
        );
        Ok(messages)
    }

    async fn save(&self, user_id: &str, messages: &[Message]) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&SaveMemoryRequest { user_id, messages })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        tracing::debug!(
            "[HttpHistoryStore] Saved {} messages for {}",
            messages.len(),
            user_id
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
