//! Non-streaming chat client (`POST /chat`).

use crate::http::{build_client, error_from_response, map_reqwest_error};
use daydream_core::{ChatRequest, ClientConfig, DaydreamError, Result, Role};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatApiRequest<'a> {
    #[serde(flatten)]
    request: &'a ChatRequest,
    /// Latest user text, for backends that read a single message.
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    response: Option<String>,
    error: Option<String>,
}

/// Sends a whole turn and waits for the complete reply.
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl ChatApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(
            build_client(config)?,
            config.chat_url(),
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

    /// Returns the assistant reply for `request`.
    ///
    /// # Errors
    ///
    /// - `Transport` / `Http` when the request fails or the status is not 2xx
    /// - `Backend` when the body carries an `error`
    /// - `Protocol` when the body has no `response`
    pub async fn send(&self, request: &ChatRequest) -> Result<String> {
        let message = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let response = self
            .client
            .post(&self.url)
            .json(&ChatApiRequest { request, message })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: ChatApiResponse = response.json().await.map_err(map_reqwest_error)?;
        if let Some(error) = body.error {
            return Err(DaydreamError::backend(error));
        }

        let reply = body
            .response
            .ok_or_else(|| DaydreamError::protocol("chat response has no 'response' field"))?;

        tracing::debug!("[ChatApiClient] Received {} chars", reply.len());
        Ok(reply)
    }
}
