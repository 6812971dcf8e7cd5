//! Shared HTTP plumbing for the backend clients.

use daydream_core::{ClientConfig, DaydreamError, Result};
pub use reqwest::Client;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Maximum number of characters of a response body quoted in errors.
const BODY_EXCERPT_LEN: usize = 200;

/// Builds the client shared by every backend call.
///
/// Only the connect timeout is set here. A whole-request timeout would cut
/// long streamed replies short, so non-streaming calls set
/// `request_timeout` per request instead.
pub fn build_client(config: &ClientConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .user_agent(concat!("daydream/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(map_reqwest_error)
}

/// Converts a `reqwest` failure into the shared error type.
pub fn map_reqwest_error(err: reqwest::Error) -> DaydreamError {
    if let Some(status) = err.status() {
        return DaydreamError::http(status.as_u16(), err.to_string());
    }
    if err.is_decode() {
        return DaydreamError::protocol(err.to_string());
    }
    if err.is_builder() {
        return DaydreamError::internal(err.to_string());
    }
    if err.is_timeout() {
        return DaydreamError::transport(format!("Request timed out: {}", err));
    }
    if err.is_connect() {
        return DaydreamError::transport(format!("Connection failed: {}", err));
    }
    DaydreamError::transport(err.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Builds an error for a non-success response, consuming its body.
///
/// A JSON `{ "error": "..." }` body contributes its message; anything else is
/// quoted as a short excerpt.
pub async fn error_from_response(response: Response) -> DaydreamError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    map_http_error(status, &body)
}

pub(crate) fn map_http_error(status: StatusCode, body: &str) -> DaydreamError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|wrapper| wrapper.error)
        .unwrap_or_else(|_| excerpt(body));

    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        message
    };

    DaydreamError::http(status.as_u16(), message)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_prefers_json_error_message() {
        let err = map_http_error(StatusCode::BAD_REQUEST, r#"{"error":"No message provided"}"#);
        assert_eq!(err, DaydreamError::http(400, "No message provided"));
    }

    #[test]
    fn test_http_error_quotes_excerpt() {
        let body = "x".repeat(500);
        let err = map_http_error(StatusCode::INTERNAL_SERVER_ERROR, &body);
        match err {
            DaydreamError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message.len(), BODY_EXCERPT_LEN + 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_http_error_empty_body_uses_reason() {
        let err = map_http_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }
}
