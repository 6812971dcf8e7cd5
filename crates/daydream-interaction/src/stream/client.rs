use super::{drive_stream, StreamHandle, StreamHandler, StreamOutcome};
use crate::http::{build_client, error_from_response, map_reqwest_error};
use daydream_core::{ChatRequest, ClientConfig, Result};
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Opens streaming chat sessions against `POST <api_url><stream_path>`.
#[derive(Debug, Clone)]
pub struct StreamClient {
    client: Client,
    url: String,
    idle_timeout: Duration,
}

impl StreamClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(
            build_client(config)?,
            config.stream_url(),
            config.stream_idle_timeout(),
        ))
    }

    pub fn with_client(client: Client, url: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            idle_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Starts a stream session for `request`.
    ///
    /// Must be called from within a tokio runtime. The request is sent on a
    /// spawned worker, so connection failures and non-success statuses are
    /// reported through `handler.on_error` rather than returned here.
    ///
    /// # Errors
    ///
    /// Returns an error only if `request` cannot be serialized.
    pub fn open<H: StreamHandler>(&self, request: &ChatRequest, handler: H) -> Result<StreamHandle> {
        let body = serde_json::to_vec(request)?;
        let id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();

        let builder = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body);

        tracing::debug!(
            "[StreamClient] Opening stream {} ({} messages, image: {})",
            id,
            request.messages.len(),
            request.image_url.is_some()
        );

        let span = tracing::info_span!("stream_session", session = %id);
        let task = tokio::spawn(
            run_session(builder, handler, token.clone(), self.idle_timeout).instrument(span),
        );

        Ok(StreamHandle::new(id, token, task))
    }
}

async fn run_session<H: StreamHandler>(
    builder: RequestBuilder,
    mut handler: H,
    cancel: CancellationToken,
    idle_timeout: Duration,
) -> StreamOutcome {
    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StreamOutcome::Cancelled,
        sent = builder.send() => sent,
    };

    let response = match sent {
        Ok(response) => response,
        Err(e) => {
            let error = map_reqwest_error(e);
            tracing::warn!("[StreamClient] Request failed: {}", error);
            handler.on_error(error);
            return StreamOutcome::Failed;
        }
    };

    if !response.status().is_success() {
        let error = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            error = error_from_response(response) => error,
        };
        tracing::warn!("[StreamClient] Backend rejected stream: {}", error);
        handler.on_error(error);
        return StreamOutcome::Failed;
    }

    let body = response.bytes_stream().map_err(map_reqwest_error);
    let outcome = drive_stream(Box::pin(body), handler, cancel, idle_timeout).await;
    tracing::debug!("[StreamClient] Stream finished: {:?}", outcome);
    outcome
}
